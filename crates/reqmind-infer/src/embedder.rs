//! Embedding engine trait and the lexical hashing embedder.
//!
//! The `EmbedderBackend` trait abstracts over embedding generation.
//! Implementations:
//! - `OnnxEmbedder`: ONNX Runtime with all-MiniLM-L6-v2 (requires the `onnx` feature)
//! - `HashingEmbedder`: signed feature hashing of word tokens, no model files

use ndarray::Array1;

use crate::stemmer;
use reqmind_core::{Error, Result};

/// Model id prefix that selects [`HashingEmbedder`].
pub const HASHING_MODEL_PREFIX: &str = "lexical-hash-";

/// Trait for embedding backends.
///
/// Implementations are deterministic: the same text and model give the same vector.
pub trait EmbedderBackend: Send + Sync {
    /// Identifier recorded in the index so that queries use the same model.
    fn model_id(&self) -> &str;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a text string.
    fn embed(&self, text: &str) -> Result<Array1<f32>>;

    /// Generate embeddings for a batch of texts, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Scale `v` to unit length. Zero vectors are returned unchanged.
pub fn normalize(mut v: Array1<f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    if norm > 1e-9 {
        v /= norm;
    }
    v
}

/// Bag-of-words embedder using signed feature hashing.
///
/// Tokens are lowercase runs of alphanumerics, `-` and `_`, so ids like `REQ-002` stay whole.
/// Stopwords are dropped and words are stemmed, then each term adds ±1 at a bucket chosen by
/// its FNV-1a hash.
pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config(
                "hashing embedder dimension must be greater than zero".into(),
            ));
        }
        Ok(Self {
            model_id: format!("{}{}", HASHING_MODEL_PREFIX, dimension),
            dimension,
        })
    }

    /// Parse `lexical-hash-<dim>`; `Ok(None)` when `model_id` names some other model.
    pub fn from_model_id(model_id: &str) -> Result<Option<Self>> {
        let Some(dim) = model_id.strip_prefix(HASHING_MODEL_PREFIX) else {
            return Ok(None);
        };
        let dimension = dim.parse().map_err(|_| {
            Error::Config(format!("Invalid hashing embedder dimension in '{}'", model_id))
        })?;
        Self::new(dimension).map(Some)
    }

    fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
            .map(|t| t.trim_matches(|c| c == '-' || c == '_'))
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
        Self::tokens(text)
            .filter(|t| !stemmer::is_stopword(t))
            .map(|t| stemmer::stem(&t))
    }
}

impl EmbedderBackend for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Array1<f32>> {
        let mut v = Array1::zeros(self.dimension);
        for term in Self::terms(text) {
            let h = fnv1a(term.as_bytes());
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        Ok(normalize(v))
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &Array1<f32>, b: &Array1<f32>) -> f32 {
        a.dot(b)
    }

    #[test]
    fn test_deterministic_and_normalized() {
        let e = HashingEmbedder::new(384).unwrap();
        let a = e.embed("REQ-002: The system shall export reports as PDF.").unwrap();
        let b = e.embed("REQ-002: The system shall export reports as PDF.").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
        assert!((a.dot(&a).sqrt() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_requirement_ids_are_tokens() {
        let tokens: Vec<_> = HashingEmbedder::tokens("See REQ-002, (req_7) and -x-.").collect();
        assert_eq!(tokens, vec!["see", "req-002", "req_7", "and", "x"]);
    }

    #[test]
    fn test_terms_are_stemmed_without_stopwords() {
        let terms: Vec<_> =
            HashingEmbedder::terms("What are the authentication requirements for REQ-002?")
                .collect();
        assert_eq!(terms, vec!["authentic", "requir", "req-002"]);
    }

    #[test]
    fn test_word_forms_match() {
        let e = HashingEmbedder::new(384).unwrap();
        let doc = e.embed("The system shall authenticate users").unwrap();
        let query = e.embed("authentication").unwrap();
        assert!(cosine(&doc, &query) > 0.0);
    }

    #[test]
    fn test_shared_words_are_closer() {
        let e = HashingEmbedder::new(384).unwrap();
        let doc = e.embed("REQ-002 export reports as PDF").unwrap();
        let related = e.embed("What does REQ-002 say about export?").unwrap();
        let unrelated = e.embed("Recipe for banana bread").unwrap();
        assert!(cosine(&doc, &related) > cosine(&doc, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let e = HashingEmbedder::new(16).unwrap();
        assert!(e.embed("  ... ").unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_batch_matches_single() {
        let e = HashingEmbedder::new(32).unwrap();
        let batch = e.embed_batch(&["alpha", "beta"]).unwrap();
        assert_eq!(batch[1], e.embed("beta").unwrap());
    }

    #[test]
    fn test_model_id_parsing() {
        assert!(HashingEmbedder::from_model_id("all-MiniLM-L6-v2").unwrap().is_none());
        let e = HashingEmbedder::from_model_id("lexical-hash-128").unwrap().unwrap();
        assert_eq!(e.dimension(), 128);
        assert!(HashingEmbedder::from_model_id("lexical-hash-").is_err());
    }
}
