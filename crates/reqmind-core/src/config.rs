//! Configuration loaded from the environment (and an optional `.env` file).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_CORPUS_DIR: &str = "documents";
pub const DEFAULT_INDEX_DIR: &str = "index";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_TOP_K: usize = 3;
/// Characters of chunk text shown per citation.
pub const DEFAULT_SNIPPET_CHARS: usize = 200;

/// Source of configuration values, keyed by variable name.
///
/// The process environment is the usual implementation; tests pass closures over maps.
pub trait EnvLookup {
    fn get(&self, key: &str) -> Option<String>;
}

impl<F> EnvLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Reads variables from the process environment. Empty values count as unset.
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Load a `.env` file into the process environment.
///
/// An explicit path must exist; without one, `.env` in the working directory is loaded if present.
/// Variables already set in the environment win.
pub fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            dotenvy::from_path(p)
                .map_err(|e| Error::Config(format!("Cannot load env file {}: {}", p.display(), e)))?;
            debug!("Loaded environment from {}", p.display());
        }
        None => {
            if let Ok(p) = dotenvy::dotenv() {
                debug!("Loaded environment from {}", p.display());
            }
        }
    }
    Ok(())
}

/// Parse an optional variable, falling back to `default` when unset.
pub fn parse_var<T>(env: &dyn EnvLookup, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{} has invalid value {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

/// Pipeline-level configuration: corpus, index, chunking and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub corpus_dir: PathBuf,
    pub index_dir: PathBuf,
    /// Embedding model identifier; recorded in the index.
    pub embedding_model: String,
    /// Directory holding `model.onnx` and `tokenizer.json` for the embedding model.
    pub model_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub snippet_chars: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from(DEFAULT_CORPUS_DIR),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            model_dir: Path::new("models").join(DEFAULT_EMBEDDING_MODEL),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

impl AppConfig {
    /// Create configuration from the process environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup(env: &dyn EnvLookup) -> Result<Self> {
        let defaults = Self::default();

        let embedding_model = env
            .get("REQMIND_EMBEDDING_MODEL")
            .unwrap_or(defaults.embedding_model);
        let model_dir = env
            .get("REQMIND_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new("models").join(model_dir_name(&embedding_model)));

        let config = Self {
            corpus_dir: env
                .get("REQMIND_CORPUS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.corpus_dir),
            index_dir: env
                .get("REQMIND_INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.index_dir),
            embedding_model,
            model_dir,
            chunk_size: parse_var(env, "REQMIND_CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_var(env, "REQMIND_CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: parse_var(env, "REQMIND_TOP_K", defaults.top_k)?,
            snippet_chars: parse_var(env, "REQMIND_SNIPPET_CHARS", defaults.snippet_chars)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that parameters are consistent.
    ///
    /// Rejects `chunk_size == 0`, `chunk_overlap >= chunk_size` and `top_k == 0`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(Error::Config("top_k must be greater than zero".into()));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(Error::Config("embedding model must not be empty".into()));
        }
        Ok(())
    }

    /// Fail unless the corpus directory exists.
    pub fn require_corpus_dir(&self) -> Result<&Path> {
        if !self.corpus_dir.is_dir() {
            return Err(Error::Config(format!(
                "Corpus directory not found: {}",
                self.corpus_dir.display()
            )));
        }
        Ok(&self.corpus_dir)
    }
}

/// HuggingFace ids such as `sentence-transformers/all-MiniLM-L6-v2` map to their last segment.
fn model_dir_name(model_id: &str) -> &str {
    model_id.rsplit('/').next().unwrap_or(model_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(&lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.model_dir, PathBuf::from("models/all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(&lookup(&[
            ("REQMIND_CHUNK_SIZE", "1000"),
            ("REQMIND_CHUNK_OVERLAP", "100"),
            ("REQMIND_TOP_K", "5"),
            ("REQMIND_EMBEDDING_MODEL", "sentence-transformers/all-MiniLM-L6-v2"),
        ]))
        .unwrap();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 100);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.model_dir, PathBuf::from("models/all-MiniLM-L6-v2"));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = AppConfig::from_lookup(&lookup(&[("REQMIND_TOP_K", "three")])).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("REQMIND_TOP_K"));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = AppConfig::from_lookup(&lookup(&[
            ("REQMIND_CHUNK_SIZE", "100"),
            ("REQMIND_CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let config = AppConfig {
            top_k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_corpus_dir() {
        let config = AppConfig {
            corpus_dir: PathBuf::from("/definitely/not/here"),
            ..Default::default()
        };
        assert!(config.require_corpus_dir().unwrap_err().is_config());
    }
}
