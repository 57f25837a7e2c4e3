//! Best-effort dictionary lookups shared by the pattern matcher and the clue solver.
//!
//! Every source reports failures through [`DefinitionError`], but callers go through
//! [`define_of`] / [`define_all`], which turn any failure into "no definition".

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::DictionaryConfig;

const MAX_CONCURRENT_LOOKUPS: usize = 8;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("dictionary request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("dictionary responded with status {0}")]
    Status(StatusCode),
}

#[async_trait]
pub trait DefinitionSource: Send + Sync {
    /// `Ok(None)` means the word is unknown to the source.
    async fn lookup(&self, word: &str) -> Result<Option<String>, DefinitionError>;
}

/// Looks up one word, logging and swallowing any failure.
pub async fn define_of(source: &dyn DefinitionSource, word: &str) -> Option<String> {
    match source.lookup(word).await {
        Ok(definition) => definition,
        Err(err) => {
            warn!(word, error = %err, "definition lookup failed");
            None
        }
    }
}

/// Looks up every word concurrently; the output lines up index-for-index with `words`.
pub async fn define_all(source: &Arc<dyn DefinitionSource>, words: &[String]) -> Vec<Option<String>> {
    let mut definitions = vec![None; words.len()];
    if words.is_empty() {
        return definitions;
    }
    let limiter = Arc::new(Semaphore::new(MAX_CONCURRENT_LOOKUPS));
    let mut tasks = JoinSet::new();
    for (idx, word) in words.iter().enumerate() {
        let source = Arc::clone(source);
        let limiter = Arc::clone(&limiter);
        let word = word.clone();
        tasks.spawn(async move {
            let _permit = limiter.acquire_owned().await.ok();
            (idx, define_of(source.as_ref(), &word).await)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, definition)) => definitions[idx] = definition,
            Err(err) => warn!(error = %err, "definition lookup task aborted"),
        }
    }
    definitions
}

/// Builds the configured source: the HTTP dictionary behind an LRU, or nothing.
pub fn from_config(config: &DictionaryConfig) -> Arc<dyn DefinitionSource> {
    if !config.enabled {
        return Arc::new(NoDefinitions);
    }
    match DictionaryApi::new(&config.base_url, config.timeout) {
        Ok(api) => Arc::new(CachedDefinitions::new(api, config.cache_capacity)),
        Err(err) => {
            warn!(error = %err, "dictionary client unavailable; definitions disabled");
            Arc::new(NoDefinitions)
        }
    }
}

/// Client for dictionaryapi.dev-style endpoints: `GET {base}/{word}`.
pub struct DictionaryApi {
    client: reqwest::Client,
    base_url: String,
}

impl DictionaryApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DefinitionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn entry_url(&self, word: &str) -> String {
        format!(
            "{}/{}",
            self.base_url,
            utf8_percent_encode(word, NON_ALPHANUMERIC)
        )
    }
}

#[async_trait]
impl DefinitionSource for DictionaryApi {
    async fn lookup(&self, word: &str) -> Result<Option<String>, DefinitionError> {
        let response = self.client.get(self.entry_url(word)).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(DefinitionError::Status(status));
        }
        let entries: Vec<DictionaryEntry> = response.json().await?;
        Ok(first_definition(&entries))
    }
}

#[derive(Debug, Deserialize)]
struct DictionaryEntry {
    #[serde(default)]
    meanings: Vec<Meaning>,
}

#[derive(Debug, Deserialize)]
struct Meaning {
    #[serde(rename = "partOfSpeech")]
    part_of_speech: Option<String>,
    #[serde(default)]
    definitions: Vec<DefinitionText>,
}

#[derive(Debug, Deserialize)]
struct DefinitionText {
    definition: String,
}

fn first_definition(entries: &[DictionaryEntry]) -> Option<String> {
    entries
        .iter()
        .flat_map(|entry| entry.meanings.iter())
        .find_map(|meaning| {
            let text = meaning
                .definitions
                .iter()
                .map(|d| d.definition.trim())
                .find(|d| !d.is_empty())?;
            Some(match meaning.part_of_speech.as_deref() {
                Some(pos) if !pos.is_empty() => format!("({pos}) {text}"),
                _ => text.to_string(),
            })
        })
}

/// Memoizes answers (including "unknown word") from an inner source.
/// Failed lookups are not cached so they can be retried.
pub struct CachedDefinitions<S> {
    inner: S,
    cache: Mutex<LruCache<String, Option<String>>>,
}

impl<S: DefinitionSource> CachedDefinitions<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}

#[async_trait]
impl<S: DefinitionSource> DefinitionSource for CachedDefinitions<S> {
    async fn lookup(&self, word: &str) -> Result<Option<String>, DefinitionError> {
        let key = word.to_lowercase();
        let hit = self.cache.lock().get(&key).cloned();
        if let Some(definition) = hit {
            debug!(word = %key, "definition cache hit");
            return Ok(definition);
        }
        let definition = self.inner.lookup(&key).await?;
        self.cache.lock().put(key, definition.clone());
        Ok(definition)
    }
}

/// Fixed in-memory glossary.
#[derive(Debug, Clone, Default)]
pub struct StaticDefinitions {
    entries: HashMap<String, String>,
}

impl StaticDefinitions {
    pub fn from_pairs<I, W, D>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (W, D)>,
        W: AsRef<str>,
        D: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(word, definition)| (word.as_ref().to_lowercase(), definition.into()))
            .collect();
        Self { entries }
    }
}

#[async_trait]
impl DefinitionSource for StaticDefinitions {
    async fn lookup(&self, word: &str) -> Result<Option<String>, DefinitionError> {
        Ok(self.entries.get(&word.to_lowercase()).cloned())
    }
}

/// Used when lookups are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefinitions;

#[async_trait]
impl DefinitionSource for NoDefinitions {
    async fn lookup(&self, _word: &str) -> Result<Option<String>, DefinitionError> {
        Ok(None)
    }
}
