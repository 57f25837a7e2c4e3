//! Crossword helper: wildcard pattern search over a word list, and language-model
//! clue solving with a per-process answer cache.

pub mod clue;
pub mod config;
pub mod definitions;
pub mod llm;
pub mod matcher;
pub mod pattern;
pub mod solver;
pub mod words;

#[cfg(feature = "web")]
pub mod web;

use std::sync::Arc;
use tracing::info;

pub use clue::{Candidate, Prompt, parse_candidates};
pub use config::AppConfig;
pub use definitions::DefinitionSource;
pub use llm::{LanguageModel, LlmError};
pub use matcher::{MatchReport, PatternMatcher, WordEntry};
pub use pattern::{Pattern, PatternError};
pub use solver::{CacheKey, ClueSolver, Solution, SolveCache, SolveNotice};
pub use words::{WordList, WordListError};

/// Both request handlers, wired to one shared definition source.
pub struct Services {
    pub matcher: PatternMatcher,
    pub solver: ClueSolver,
}

impl Services {
    pub fn new(
        words: Arc<WordList>,
        model: Arc<dyn LanguageModel>,
        definitions: Arc<dyn DefinitionSource>,
        max_candidates: usize,
    ) -> Self {
        let matcher = PatternMatcher::new(words, Arc::clone(&definitions));
        let solver = ClueSolver::new(model, definitions, Arc::new(SolveCache::new()))
            .with_max_candidates(max_candidates);
        Self { matcher, solver }
    }

    /// Loads the word list and builds the collaborators described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, WordListError> {
        let words = match &config.words_path {
            Some(path) => Arc::new(WordList::load(path)?),
            None => WordList::embedded(),
        };
        let model = llm::from_config(&config.llm);
        let definitions = definitions::from_config(&config.dictionary);
        info!(
            words = words.len(),
            model_available = model.is_available(),
            definitions = config.dictionary.enabled,
            "Services ready"
        );
        Ok(Self::new(words, model, definitions, config.llm.max_candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DictionaryConfig;

    #[tokio::test]
    async fn default_config_matches_without_a_model() {
        let config = AppConfig {
            dictionary: DictionaryConfig {
                enabled: false,
                ..DictionaryConfig::default()
            },
            ..AppConfig::default()
        };
        let services = Services::from_config(&config).unwrap();
        assert!(!services.solver.model_available());

        let report = services.matcher.match_pattern("c_t", None).await;
        assert!(report.entries.iter().any(|e| e.word == "cat"));

        let solution = services.solver.solve("Feline pet", Some("c_t")).await;
        assert!(solution.candidates.is_empty());
        assert_eq!(solution.notice, Some(SolveNotice::ModelUnavailable));
    }

    #[test]
    fn missing_word_file_is_reported() {
        let config = AppConfig {
            words_path: Some("/nonexistent/crossword-words.txt".into()),
            ..AppConfig::default()
        };
        assert!(matches!(
            Services::from_config(&config),
            Err(WordListError::Io { .. })
        ));
    }
}
