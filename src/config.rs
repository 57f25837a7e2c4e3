use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DICTIONARY_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Absent key leaves clue solving "unavailable" without affecting pattern search.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_candidates: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            timeout: Duration::from_secs(20),
            max_candidates: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DictionaryConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout: Duration,
    pub cache_capacity: usize,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: DEFAULT_DICTIONARY_URL.to_string(),
            timeout: Duration::from_secs(5),
            cache_capacity: 4096,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub dictionary: DictionaryConfig,
    /// `None` selects the embedded word list.
    pub words_path: Option<PathBuf>,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            dictionary: DictionaryConfig::default(),
            words_path: None,
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let defaults = Self::default();

        let llm = LlmConfig {
            api_key: value("OPENAI_API_KEY"),
            base_url: value("CROSSWORD_LLM_BASE_URL").unwrap_or(defaults.llm.base_url),
            model: value("CROSSWORD_LLM_MODEL").unwrap_or(defaults.llm.model),
            timeout: parsed(&value, "CROSSWORD_LLM_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.llm.timeout),
            max_candidates: parsed(&value, "CROSSWORD_MAX_CANDIDATES")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.llm.max_candidates),
        };

        let dictionary = DictionaryConfig {
            enabled: value("CROSSWORD_DEFINITIONS")
                .map(|flag| !matches!(flag.to_ascii_lowercase().as_str(), "off" | "false" | "0" | "no"))
                .unwrap_or(defaults.dictionary.enabled),
            base_url: value("CROSSWORD_DICTIONARY_URL").unwrap_or(defaults.dictionary.base_url),
            timeout: defaults.dictionary.timeout,
            cache_capacity: parsed(&value, "CROSSWORD_DEFINITION_CACHE")
                .unwrap_or(defaults.dictionary.cache_capacity),
        };

        Self {
            llm,
            dictionary,
            words_path: value("CROSSWORD_WORDS").map(PathBuf::from),
            port: parsed(&value, "PORT").unwrap_or(defaults.port),
        }
    }
}

fn parsed<T, F>(value: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = value(key)?;
    match raw.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert_eq!(config.llm.max_candidates, 10);
        assert!(config.dictionary.enabled);
        assert!(config.words_path.is_none());
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = config_from(&[
            ("OPENAI_API_KEY", " sk-test "),
            ("CROSSWORD_LLM_MODEL", "local-model"),
            ("CROSSWORD_LLM_TIMEOUT_SECS", "3"),
            ("CROSSWORD_WORDS", "/tmp/words.txt"),
            ("PORT", "8080"),
        ]);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.timeout, Duration::from_secs(3));
        assert_eq!(config.words_path, Some(PathBuf::from("/tmp/words.txt")));
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = config_from(&[("OPENAI_API_KEY", "   ")]);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let config = config_from(&[("PORT", "eighty"), ("CROSSWORD_MAX_CANDIDATES", "0")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.llm.max_candidates, 10);
    }

    #[test]
    fn definitions_can_be_switched_off() {
        assert!(!config_from(&[("CROSSWORD_DEFINITIONS", "off")]).dictionary.enabled);
        assert!(!config_from(&[("CROSSWORD_DEFINITIONS", "FALSE")]).dictionary.enabled);
        assert!(config_from(&[("CROSSWORD_DEFINITIONS", "on")]).dictionary.enabled);
    }
}
