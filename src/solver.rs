use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clue::{Candidate, Prompt, parse_candidates};
use crate::definitions::{DefinitionSource, define_all};
use crate::llm::{LanguageModel, LlmError};
use crate::pattern::Pattern;

pub const DEFAULT_MAX_CANDIDATES: usize = 10;

/// Normalized `(clue, pattern)` pair.
///
/// The clue is trimmed and lowercased; the pattern is stored in canonical form
/// (lowercase, `_` wildcards) so `C?T` and `c_t` share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    clue: String,
    pattern: Option<String>,
}

impl CacheKey {
    pub fn new(clue: &str, pattern: Option<&Pattern>) -> Self {
        Self {
            clue: clue.trim().to_lowercase(),
            pattern: pattern.map(Pattern::to_string),
        }
    }

    pub fn clue(&self) -> &str {
        &self.clue
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }
}

/// Process-lifetime answer cache. Unbounded, never evicted; concurrent writers
/// for the same key simply overwrite each other.
#[derive(Debug, Default)]
pub struct SolveCache {
    entries: RwLock<HashMap<CacheKey, Vec<Candidate>>>,
}

impl SolveCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<Candidate>> {
        self.entries.read().get(key).cloned()
    }

    /// Empty lists are ignored so failed solves stay retryable.
    pub fn insert(&self, key: CacheKey, candidates: Vec<Candidate>) {
        if candidates.is_empty() {
            return;
        }
        self.entries.write().insert(key, candidates);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Why a solve produced no candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveNotice {
    EmptyClue,
    InvalidPattern,
    ModelUnavailable,
    ModelFailed,
    UnparseableReply,
    NoMatchingCandidates,
}

impl SolveNotice {
    pub fn message(&self) -> &'static str {
        match self {
            SolveNotice::EmptyClue => "Enter a clue to solve.",
            SolveNotice::InvalidPattern => "Patterns may only contain letters and _ ? . wildcards.",
            SolveNotice::ModelUnavailable => "Clue solving is unavailable: no language model is configured.",
            SolveNotice::ModelFailed => "The language model could not be reached. Try again shortly.",
            SolveNotice::UnparseableReply => "The language model reply could not be understood.",
            SolveNotice::NoMatchingCandidates => "No suggested answers fit the pattern.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub candidates: Vec<Candidate>,
    pub cached: bool,
    pub notice: Option<SolveNotice>,
}

impl Solution {
    fn empty(notice: SolveNotice) -> Self {
        Self {
            candidates: Vec::new(),
            cached: false,
            notice: Some(notice),
        }
    }
}

pub struct ClueSolver {
    model: Arc<dyn LanguageModel>,
    definitions: Arc<dyn DefinitionSource>,
    cache: Arc<SolveCache>,
    max_candidates: usize,
}

impl ClueSolver {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        definitions: Arc<dyn DefinitionSource>,
        cache: Arc<SolveCache>,
    ) -> Self {
        Self {
            model,
            definitions,
            cache,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates.max(1);
        self
    }

    pub fn model_available(&self) -> bool {
        self.model.is_available()
    }

    pub fn cache(&self) -> &SolveCache {
        &self.cache
    }

    /// Suggests answers for `clue`, optionally constrained by `pattern`.
    ///
    /// Never fails: every problem is reported through [`Solution::notice`] with an
    /// empty candidate list. Only non-empty results are cached.
    pub async fn solve(&self, clue: &str, pattern: Option<&str>) -> Solution {
        let clue = clue.trim();
        if clue.is_empty() {
            return Solution::empty(SolveNotice::EmptyClue);
        }
        let pattern = match pattern.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => None,
            Some(raw) => match Pattern::parse(raw) {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    debug!(pattern = raw, error = %err, "rejecting clue pattern");
                    return Solution::empty(SolveNotice::InvalidPattern);
                }
            },
        };

        let key = CacheKey::new(clue, pattern.as_ref());
        if let Some(candidates) = self.cache.get(&key) {
            debug!(clue = key.clue(), pattern = ?key.pattern(), "clue cache hit");
            return Solution {
                candidates,
                cached: true,
                notice: None,
            };
        }
        debug!(clue = key.clue(), pattern = ?key.pattern(), "clue cache miss");

        let prompt = Prompt::for_clue(clue, pattern.as_ref(), self.max_candidates);
        let reply = match self.model.complete(&prompt).await {
            Ok(reply) => reply,
            Err(LlmError::Unavailable) => return Solution::empty(SolveNotice::ModelUnavailable),
            Err(err) => {
                warn!(clue, error = %err, "language model call failed");
                return Solution::empty(SolveNotice::ModelFailed);
            }
        };

        let parsed = match parse_candidates(&reply) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(clue, error = %err, reply = %reply, "could not parse model reply");
                return Solution::empty(SolveNotice::UnparseableReply);
            }
        };

        let mut candidates: Vec<Candidate> = match &pattern {
            Some(pattern) => parsed
                .into_iter()
                .filter(|candidate| pattern.matches(&candidate.answer))
                .collect(),
            None => parsed,
        };
        candidates.truncate(self.max_candidates);
        if candidates.is_empty() {
            return Solution::empty(SolveNotice::NoMatchingCandidates);
        }

        let words: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.answer.to_lowercase())
            .collect();
        let definitions = define_all(&self.definitions, &words).await;
        for (candidate, definition) in candidates.iter_mut().zip(definitions) {
            candidate.definition = definition;
        }

        self.cache.insert(key, candidates.clone());
        Solution {
            candidates,
            cached: false,
            notice: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{NoDefinitions, StaticDefinitions};
    use crate::llm::Unavailable;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Script {
        Reply(&'static str),
        /// Replies only once every concurrent caller has reached the model.
        Gated(&'static str, tokio::sync::Barrier),
        Unreachable,
    }

    struct ScriptedModel {
        script: Script,
        calls: AtomicUsize,
        prompts: Mutex<Vec<Prompt>>,
    }

    impl ScriptedModel {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(prompt.clone());
            match &self.script {
                Script::Reply(text) => Ok(text.to_string()),
                Script::Gated(text, barrier) => {
                    barrier.wait().await;
                    Ok(text.to_string())
                }
                Script::Unreachable => Err(LlmError::RateLimited),
            }
        }
    }

    fn solver_with(model: Arc<ScriptedModel>) -> ClueSolver {
        let definitions = StaticDefinitions::from_pairs([
            ("cat", "A small domesticated feline."),
            ("cot", "A small bed."),
        ]);
        ClueSolver::new(model, Arc::new(definitions), Arc::new(SolveCache::new()))
    }

    fn answers(solution: &Solution) -> Vec<&str> {
        solution
            .candidates
            .iter()
            .map(|c| c.answer.as_str())
            .collect()
    }

    #[tokio::test]
    async fn pattern_filters_model_candidates() {
        let model = ScriptedModel::new(Script::Reply("CAT, COT, RAT"));
        let solver = solver_with(model.clone());
        let solution = solver.solve("Feline pet (3)", Some("C_T")).await;
        assert_eq!(answers(&solution), vec!["CAT", "COT"]);
        assert_eq!(solution.notice, None);
        assert!(!solution.cached);
        assert_eq!(
            solution.candidates[0].definition.as_deref(),
            Some("A small domesticated feline.")
        );
        assert_eq!(solution.candidates[1].definition.as_deref(), Some("A small bed."));
    }

    #[tokio::test]
    async fn candidate_failing_fixed_letter_is_dropped() {
        let model = ScriptedModel::new(Script::Reply("CAT\nDOG"));
        let solver = solver_with(model);
        let solution = solver.solve("Pet", Some("c_t")).await;
        assert_eq!(answers(&solution), vec!["CAT"]);
    }

    #[tokio::test]
    async fn second_identical_solve_is_served_from_cache() {
        let model = ScriptedModel::new(Script::Reply("CAT | pet\nCOT"));
        let solver = solver_with(model.clone());
        let first = solver.solve("Feline pet (3)", Some("C_T")).await;
        let second = solver.solve("Feline pet (3)", Some("C_T")).await;
        assert_eq!(model.calls(), 1);
        assert!(second.cached);
        assert_eq!(first.candidates, second.candidates);
    }

    #[tokio::test]
    async fn concurrent_misses_both_solve_and_leave_one_entry() {
        let model = ScriptedModel::new(Script::Gated(
            "CAT | pet\nCOT",
            tokio::sync::Barrier::new(2),
        ));
        let solver = solver_with(model.clone());
        let (first, second) = tokio::join!(
            solver.solve("Feline pet (3)", Some("C_T")),
            solver.solve("feline pet (3)", Some("c?t")),
        );
        assert_eq!(model.calls(), 2);
        assert_eq!(answers(&first), vec!["CAT", "COT"]);
        assert_eq!(answers(&second), vec!["CAT", "COT"]);
        assert!(!first.cached && !second.cached);
        assert_eq!(solver.cache().len(), 1);

        let third = solver.solve("Feline pet (3)", Some("c_t")).await;
        assert!(third.cached);
        assert_eq!(third.candidates, first.candidates);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn cache_key_ignores_clue_case_and_wildcard_spelling() {
        let model = ScriptedModel::new(Script::Reply("CAT"));
        let solver = solver_with(model.clone());
        solver.solve("Feline pet", Some("C_T")).await;
        let again = solver.solve("  feline PET ", Some("c?t")).await;
        assert!(again.cached);
        assert_eq!(model.calls(), 1);
        assert!(solver.cache().contains(&CacheKey::new("feline pet", Pattern::parse("c.t").ok().as_ref())));
    }

    #[tokio::test]
    async fn different_pattern_is_a_different_key() {
        let model = ScriptedModel::new(Script::Reply("CAT, CATS"));
        let solver = solver_with(model.clone());
        solver.solve("Feline", Some("c_t")).await;
        let plural = solver.solve("Feline", Some("c__s")).await;
        let open = solver.solve("Feline", None).await;
        assert_eq!(model.calls(), 3);
        assert_eq!(answers(&plural), vec!["CATS"]);
        assert_eq!(answers(&open), vec!["CAT", "CATS"]);
        assert_eq!(solver.cache().len(), 3);
    }

    #[tokio::test]
    async fn blank_pattern_counts_as_no_pattern() {
        let model = ScriptedModel::new(Script::Reply("CAT, KITTEN"));
        let solver = solver_with(model.clone());
        let solution = solver.solve("Feline", Some("   ")).await;
        assert_eq!(answers(&solution), vec!["CAT", "KITTEN"]);
        assert!(!model.prompts.lock()[0].user.contains("Pattern"));
    }

    #[tokio::test]
    async fn unreachable_model_returns_empty_and_is_not_cached() {
        let model = ScriptedModel::new(Script::Unreachable);
        let solver = solver_with(model.clone());
        let first = solver.solve("Feline pet", Some("c_t")).await;
        assert!(first.candidates.is_empty());
        assert_eq!(first.notice, Some(SolveNotice::ModelFailed));
        let retry = solver.solve("Feline pet", Some("c_t")).await;
        assert!(!retry.cached);
        assert_eq!(model.calls(), 2);
        assert!(solver.cache().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_model_reports_unavailable() {
        let solver = ClueSolver::new(
            Arc::new(Unavailable),
            Arc::new(NoDefinitions),
            Arc::new(SolveCache::new()),
        );
        assert!(!solver.model_available());
        let solution = solver.solve("Feline pet", None).await;
        assert!(solution.candidates.is_empty());
        assert_eq!(solution.notice, Some(SolveNotice::ModelUnavailable));
    }

    #[tokio::test]
    async fn invalid_input_skips_model_call() {
        let model = ScriptedModel::new(Script::Reply("CAT"));
        let solver = solver_with(model.clone());
        assert_eq!(solver.solve("   ", None).await.notice, Some(SolveNotice::EmptyClue));
        assert_eq!(
            solver.solve("Feline", Some("c4t")).await.notice,
            Some(SolveNotice::InvalidPattern)
        );
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn unparseable_reply_is_reported_and_not_cached() {
        let model = ScriptedModel::new(Script::Reply("42\n???"));
        let solver = solver_with(model);
        let solution = solver.solve("Feline", None).await;
        assert_eq!(solution.notice, Some(SolveNotice::UnparseableReply));
        assert!(solver.cache().is_empty());
    }

    #[tokio::test]
    async fn nothing_fitting_pattern_is_not_cached() {
        let model = ScriptedModel::new(Script::Reply("DOG, RAT"));
        let solver = solver_with(model);
        let solution = solver.solve("Feline", Some("c_t")).await;
        assert_eq!(solution.notice, Some(SolveNotice::NoMatchingCandidates));
        assert!(solver.cache().is_empty());
    }

    #[tokio::test]
    async fn missing_definitions_keep_candidates() {
        let model = ScriptedModel::new(Script::Reply("CUT, CAT"));
        let solver = solver_with(model);
        let solution = solver.solve("Snip", Some("c_t")).await;
        assert_eq!(answers(&solution), vec!["CUT", "CAT"]);
        assert_eq!(solution.candidates[0].definition, None);
        assert!(solution.candidates[1].definition.is_some());
    }

    #[tokio::test]
    async fn results_are_capped_at_max_candidates() {
        let model = ScriptedModel::new(Script::Reply("CAT, COT, CUT"));
        let solver = solver_with(model.clone()).with_max_candidates(2);
        let solution = solver.solve("Three letters", Some("c_t")).await;
        assert_eq!(answers(&solution), vec!["CAT", "COT"]);
        assert!(model.prompts.lock()[0].system.contains("up to 2"));
    }

    #[test]
    fn cache_ignores_empty_inserts() {
        let cache = SolveCache::new();
        let key = CacheKey::new("clue", None);
        cache.insert(key.clone(), Vec::new());
        assert!(!cache.contains(&key));
        cache.insert(key.clone(), vec![Candidate::new("CAT")]);
        assert_eq!(cache.get(&key).map(|c| c.len()), Some(1));
    }
}
