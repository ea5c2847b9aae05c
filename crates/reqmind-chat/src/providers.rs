//! Text generation backends.
//!
//! Each backend speaks one HTTP API and supports some subset of the generation
//! modes. HuggingFace and Ollama both offer completion and chat endpoints.

mod huggingface;
mod ollama;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::{BackendKind, GeneratorConfig};
use crate::error::GenerateError;
use crate::types::{GenerationMode, PromptRequest};
use reqmind_core::{Error, Result};

pub use huggingface::HuggingFaceBackend;
pub use ollama::OllamaBackend;

/// A model that turns prompts into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend and model, for logs.
    fn name(&self) -> String;

    /// Generate raw text for `request` using `mode`.
    async fn generate(
        &self,
        mode: GenerationMode,
        request: &PromptRequest,
    ) -> std::result::Result<String, GenerateError>;
}

/// Build the backend selected by `config`.
pub fn build_backend(config: &GeneratorConfig) -> Result<Arc<dyn TextGenerator>> {
    let client = Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

    Ok(match config.backend {
        BackendKind::HuggingFace => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                Error::Config("HUGGINGFACE_API_KEY is required for the huggingface backend".into())
            })?;
            Arc::new(HuggingFaceBackend::new(client, config, api_key))
        }
        BackendKind::Ollama => Arc::new(OllamaBackend::new(client, config)),
    })
}

/// POST `body` and return the parsed JSON, mapping HTTP failures to [`GenerateError`].
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
    model: &str,
) -> std::result::Result<serde_json::Value, GenerateError> {
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| GenerateError::Transport(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| GenerateError::Transport(e.to_string()))?;
    debug!("Generator responded {} ({} bytes)", status, text.len());

    if !status.is_success() {
        return Err(GenerateError::from_status(status.as_u16(), &text, model));
    }
    serde_json::from_str(&text).map_err(|e| GenerateError::InvalidResponse(e.to_string()))
}

/// A 2xx body without the field this mode needs means the endpoint answers in some other shape.
fn missing_field(mode: GenerationMode, body: &serde_json::Value) -> GenerateError {
    let preview: String = body.to_string().chars().take(200).collect();
    GenerateError::UnsupportedMode(format!("unexpected {} response: {}", mode, preview))
}
