//! ReqMind Infer: embedding backends.
//!
//! Provides the `EmbedderBackend` trait for generating embeddings.
//! With the `onnx` feature, `OnnxEmbedder` loads a SentenceTransformers model
//! (all-MiniLM-L6-v2, 384-dim). `HashingEmbedder` needs no model files and is
//! selected explicitly with the model id `lexical-hash-<dim>`.

pub mod embedder;
pub mod onnx_embedder;
pub mod stemmer;

pub use embedder::{normalize, EmbedderBackend, HashingEmbedder, HASHING_MODEL_PREFIX};

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

use reqmind_core::Result;

/// Create the embedder named by `model_id`.
///
/// `lexical-hash[-<dim>]` selects [`HashingEmbedder`]. Any other id is loaded as an ONNX
/// model from `model_dir`. A model that cannot be loaded is a configuration error; there
/// is no fallback to a different model.
pub fn create_embedder(model_id: &str, model_dir: &Path) -> Result<Arc<dyn EmbedderBackend>> {
    if let Some(embedder) = HashingEmbedder::from_model_id(model_id)? {
        tracing::info!("Using lexical hashing embedder (dim={})", embedder.dimension());
        return Ok(Arc::new(embedder));
    }

    #[cfg(feature = "onnx")]
    {
        let embedder = OnnxEmbedder::load(model_id, model_dir)?;
        tracing::info!("Using ONNX embedder {} (dim={})", model_id, embedder.dimension());
        Ok(Arc::new(embedder))
    }

    #[cfg(not(feature = "onnx"))]
    {
        Err(reqmind_core::Error::Config(format!(
            "Embedding model '{}' ({}) needs the `onnx` feature; use '{}384' for the offline embedder",
            model_id,
            model_dir.display(),
            HASHING_MODEL_PREFIX
        )))
    }
}
