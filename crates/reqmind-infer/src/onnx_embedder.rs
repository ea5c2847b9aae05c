//! ONNX-based embedding engine for SentenceTransformers models.
//!
//! Loads an ONNX export and its tokenizer to generate mean-pooled, L2-normalized
//! float32 embeddings (384-dim for all-MiniLM-L6-v2). Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use ndarray::Array1;
    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::{debug, info};

    use crate::embedder::{normalize, EmbedderBackend};
    use reqmind_core::{Error, Result};

    /// Maximum sequence length for the model.
    const MAX_SEQ_LEN: usize = 512;

    /// ONNX embedding engine.
    pub struct OnnxEmbedder {
        model_id: String,
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        dimension: usize,
    }

    impl OnnxEmbedder {
        /// Load an ONNX model and tokenizer from the given directory.
        ///
        /// Expects:
        /// - `model_dir/model.onnx`: the ONNX model file
        /// - `model_dir/tokenizer.json`: the HuggingFace tokenizer
        ///
        /// The dimension is measured with one inference at load time.
        pub fn load(model_id: &str, model_dir: &Path) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::Config(format!(
                    "Embedding model '{}' not found: {}",
                    model_id,
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(Error::Config(format!(
                    "Tokenizer for '{}' not found: {}",
                    model_id,
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::Config(format!("Failed to create session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::Config(format!("Failed to set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::Config(format!("Failed to load ONNX model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::Config(format!("Failed to load tokenizer: {}", e)))?;

            let mut embedder = Self {
                model_id: model_id.to_string(),
                session: Mutex::new(session),
                tokenizer,
                dimension: 0,
            };
            embedder.dimension = embedder.infer("dimension check")?.len();

            info!(
                "ONNX embedder loaded: dim={}, model={}",
                embedder.dimension,
                model_path.display()
            );
            Ok(embedder)
        }

        /// Run inference and pool the output into one sentence vector.
        fn infer(&self, text: &str) -> Result<Array1<f32>> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| Error::Embedding(format!("Tokenization failed: {}", e)))?;

            let input_ids = encoding.get_ids();
            let attention_mask = encoding.get_attention_mask();

            let seq_len = input_ids.len().min(MAX_SEQ_LEN);
            let input_ids = &input_ids[..seq_len];
            let attention_mask = &attention_mask[..seq_len];

            let ids_data: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
            let mask_data: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();
            let type_ids_data: Vec<i64> = vec![0i64; seq_len];

            let tensor = |data: Vec<i64>| {
                Tensor::from_array(([1usize, seq_len], data))
                    .map_err(|e| Error::Embedding(format!("Failed to create tensor: {}", e)))
            };
            let ids_tensor = tensor(ids_data)?;
            let mask_tensor = tensor(mask_data)?;
            let type_ids_tensor = tensor(type_ids_data)?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
                .map_err(|e| Error::Embedding(format!("ONNX inference failed: {}", e)))?;

            // SentenceTransformers exports output either
            //   [1, seq_len, dim] token embeddings, which need mean pooling, or
            //   [1, dim] sentence embeddings, already pooled.
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Embedding(format!("Failed to extract output tensor: {}", e)))?;

            let shape_dims: Vec<i64> = shape.iter().copied().collect();

            let embedding = match shape_dims.len() {
                3 => {
                    let dim = shape_dims[2] as usize;
                    let mask_sum: f32 = attention_mask.iter().map(|&m| m as f32).sum();
                    if mask_sum < 1e-9 {
                        return Ok(Array1::zeros(dim));
                    }

                    // data is laid out as [batch=1][seq_len][dim]
                    let mut pooled = Array1::zeros(dim);
                    for (i, &m) in attention_mask.iter().enumerate() {
                        if m > 0 {
                            let offset = i * dim;
                            for d in 0..dim {
                                pooled[d] += data[offset + d];
                            }
                        }
                    }
                    pooled / mask_sum
                }
                2 => {
                    let dim = shape_dims[1] as usize;
                    Array1::from_vec(data[..dim].to_vec())
                }
                _ => {
                    return Err(Error::Embedding(format!(
                        "Unexpected output shape: {:?}",
                        shape_dims
                    )))
                }
            };

            debug!("Embedded {} tokens", seq_len);
            Ok(normalize(embedding))
        }
    }

    impl EmbedderBackend for OnnxEmbedder {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn embed(&self, text: &str) -> Result<Array1<f32>> {
            self.infer(text)
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
