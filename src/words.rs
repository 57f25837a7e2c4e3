use once_cell::sync::Lazy;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use zstd::stream::decode_all;

static EMBEDDED_WORDS: &str = include_str!("../data/words.txt");

static DEFAULT_LIST: Lazy<Arc<WordList>> =
    Lazy::new(|| Arc::new(WordList::from_text(EMBEDDED_WORDS)));

#[derive(Debug, Error)]
pub enum WordListError {
    #[error("failed to read word list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("word list {path} is not valid UTF-8")]
    Encoding { path: PathBuf },
}

/// Lowercased dictionary words in file order.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    words: Vec<String>,
}

impl WordList {
    /// The list compiled into the binary.
    pub fn embedded() -> Arc<WordList> {
        Arc::clone(&DEFAULT_LIST)
    }

    /// One word per line; blank lines are skipped, everything else is trimmed and lowercased.
    pub fn from_text(text: &str) -> Self {
        let words = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self { words }
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_lowercase())
            .filter(|word| !word.is_empty())
            .collect();
        Self { words }
    }

    /// Loads a plain-text list, or a zstd-compressed one when the path ends in `.zst`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WordListError> {
        let path = path.as_ref();
        let io_err = |source| WordListError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let bytes = if path.extension().is_some_and(|ext| ext == "zst") {
            decode_all(BufReader::new(file)).map_err(io_err)?
        } else {
            let mut buf = Vec::new();
            BufReader::new(file).read_to_end(&mut buf).map_err(io_err)?;
            buf
        };
        let text = String::from_utf8(bytes).map_err(|_| WordListError::Encoding {
            path: path.to_path_buf(),
        })?;
        let list = Self::from_text(&text);
        info!(path = %path.display(), words = list.len(), "Loaded word list");
        Ok(list)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.words.iter().map(String::as_str)
    }
}
