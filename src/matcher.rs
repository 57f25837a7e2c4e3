use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::definitions::{DefinitionSource, define_all};
use crate::pattern::Pattern;
use crate::words::WordList;

/// Lists shorter than this are scanned on the calling thread.
const PARALLEL_SCAN_THRESHOLD: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    /// Canonical form of the pattern, or the trimmed input when it did not parse.
    pub pattern: String,
    /// Matches before any limit was applied.
    pub total: usize,
    pub entries: Vec<WordEntry>,
}

pub struct PatternMatcher {
    words: Arc<WordList>,
    definitions: Arc<dyn DefinitionSource>,
}

impl PatternMatcher {
    pub fn new(words: Arc<WordList>, definitions: Arc<dyn DefinitionSource>) -> Self {
        Self { words, definitions }
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Words that fit `pattern`, in word-list order.
    pub fn find(&self, pattern: &Pattern) -> Vec<&str> {
        let words = self.words.words();
        if words.len() < PARALLEL_SCAN_THRESHOLD {
            words
                .iter()
                .filter(|word| pattern.matches(word))
                .map(String::as_str)
                .collect()
        } else {
            words
                .par_iter()
                .filter(|word| pattern.matches(word))
                .map(String::as_str)
                .collect()
        }
    }

    /// Matches `raw` against the list and attaches definitions.
    ///
    /// An empty or malformed pattern yields an empty report. `limit` truncates the
    /// match list before any definition is fetched.
    pub async fn match_pattern(&self, raw: &str, limit: Option<usize>) -> MatchReport {
        let pattern = match Pattern::parse(raw) {
            Ok(pattern) => pattern,
            Err(err) => {
                debug!(pattern = raw, error = %err, "rejecting match pattern");
                return MatchReport {
                    pattern: raw.trim().to_string(),
                    total: 0,
                    entries: Vec::new(),
                };
            }
        };

        let found = self.find(&pattern);
        let total = found.len();
        let keep = limit.map_or(total, |limit| limit.min(total));
        let words: Vec<String> = found[..keep].iter().map(|word| word.to_string()).collect();
        debug!(pattern = %pattern, total, returned = keep, "pattern matched");

        let definitions = define_all(&self.definitions, &words).await;
        let entries = words
            .into_iter()
            .zip(definitions)
            .map(|(word, definition)| WordEntry { word, definition })
            .collect();
        MatchReport {
            pattern: pattern.to_string(),
            total,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{DefinitionError, NoDefinitions, StaticDefinitions};
    use async_trait::async_trait;

    struct BrokenDictionary;

    #[async_trait]
    impl DefinitionSource for BrokenDictionary {
        async fn lookup(&self, _word: &str) -> Result<Option<String>, DefinitionError> {
            Err(DefinitionError::Status(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    fn matcher(words: &[&str], definitions: Arc<dyn DefinitionSource>) -> PatternMatcher {
        PatternMatcher::new(Arc::new(WordList::from_words(words)), definitions)
    }

    fn words_of(report: &MatchReport) -> Vec<&str> {
        report.entries.iter().map(|e| e.word.as_str()).collect()
    }

    #[tokio::test]
    async fn c_t_matches_three_letter_c_words() {
        let definitions = StaticDefinitions::from_pairs([("cat", "feline"), ("cut", "incision")]);
        let m = matcher(&["cat", "cot", "cut", "dog"], Arc::new(definitions));
        let report = m.match_pattern("C_T", None).await;
        assert_eq!(words_of(&report), vec!["cat", "cot", "cut"]);
        assert_eq!(report.total, 3);
        assert_eq!(report.entries[0].definition.as_deref(), Some("feline"));
        assert_eq!(report.entries[1].definition, None);
        assert_eq!(report.entries[2].definition.as_deref(), Some("incision"));
    }

    #[tokio::test]
    async fn empty_pattern_matches_nothing() {
        let m = matcher(&["a", "cat"], Arc::new(NoDefinitions));
        let report = m.match_pattern("", None).await;
        assert!(report.entries.is_empty());
        assert_eq!(report.total, 0);
    }

    #[tokio::test]
    async fn unsupported_characters_match_nothing() {
        let m = matcher(&["cat", "c4t"], Arc::new(NoDefinitions));
        for raw in ["c4t", "c t", "c*t", "[ct]"] {
            let report = m.match_pattern(raw, None).await;
            assert!(report.entries.is_empty(), "{raw} should match nothing");
        }
    }

    #[tokio::test]
    async fn results_follow_word_list_order() {
        let m = matcher(&["cut", "zzz", "cat", "cot"], Arc::new(NoDefinitions));
        let report = m.match_pattern("c?t", None).await;
        assert_eq!(words_of(&report), vec!["cut", "cat", "cot"]);
    }

    #[tokio::test]
    async fn limit_truncates_but_total_counts_everything() {
        let m = matcher(&["cat", "cot", "cut"], Arc::new(NoDefinitions));
        let report = m.match_pattern("___", Some(2)).await;
        assert_eq!(words_of(&report), vec!["cat", "cot"]);
        assert_eq!(report.total, 3);
        assert_eq!(report.pattern, "___");
    }

    #[tokio::test]
    async fn dictionary_failure_leaves_definitions_empty() {
        let m = matcher(&["cat", "cot"], Arc::new(BrokenDictionary));
        let report = m.match_pattern("c_t", None).await;
        assert_eq!(words_of(&report), vec!["cat", "cot"]);
        assert!(report.entries.iter().all(|e| e.definition.is_none()));
    }

    #[test]
    fn every_match_agrees_with_pattern_shape() {
        let list = [
            "cat", "cot", "cut", "dog", "crate", "crane", "caste", "a", "an", "ant", "trace",
            "brace", "grace", "cart", "coat", "chat",
        ];
        let m = matcher(&list, Arc::new(NoDefinitions));
        for raw in ["c_t", "_____", "C?A?E", "__a__", "a", "_", "c__t", "._.", "zzz"] {
            let pattern = Pattern::parse(raw).unwrap();
            let shape: Vec<char> = raw.to_lowercase().chars().collect();
            for word in m.find(&pattern) {
                let letters: Vec<char> = word.chars().collect();
                assert_eq!(letters.len(), shape.len(), "{word} vs {raw}");
                for (expected, actual) in shape.iter().zip(&letters) {
                    if !matches!(expected, '_' | '?' | '.') {
                        assert_eq!(expected, actual, "{word} vs {raw}");
                    }
                }
            }
        }
    }

    #[test]
    fn large_lists_are_scanned_in_order() {
        let list: Vec<String> = (0..PARALLEL_SCAN_THRESHOLD * 2)
            .map(|i| format!("w{:06}", i))
            .collect();
        let m = PatternMatcher::new(Arc::new(WordList::from_words(&list)), Arc::new(NoDefinitions));
        let pattern = Pattern::parse("_______").unwrap();
        let found = m.find(&pattern);
        assert_eq!(found.len(), list.len());
        assert!(found.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
