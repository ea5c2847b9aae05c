//! Generation with mode fallback and loading retries.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;
use crate::error::GenerateError;
use crate::prompt::post_process;
use crate::providers::{build_backend, TextGenerator};
use crate::retry::RetryPolicy;
use crate::types::{GenerationMode, PromptRequest};
use reqmind_core::{Error, Result};

/// Drives a backend through an ordered list of generation modes.
pub struct Generator {
    backend: Arc<dyn TextGenerator>,
    strategies: Vec<GenerationMode>,
    retry: RetryPolicy,
}

impl Generator {
    pub fn new(
        backend: Arc<dyn TextGenerator>,
        strategies: Vec<GenerationMode>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::Config("at least one generation mode is required".into()));
        }
        Ok(Self {
            backend,
            strategies,
            retry,
        })
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        let backend = build_backend(config)?;
        info!("Generator: {}", config);
        Self::new(backend, config.strategies.clone(), config.retry)
    }

    pub fn backend_name(&self) -> String {
        self.backend.name()
    }

    /// Produce a post-processed answer for `request`.
    ///
    /// Moves to the next mode only when the backend reports the current one unsupported.
    /// Any other failure ends the attempt.
    pub async fn generate(&self, request: &PromptRequest) -> Result<String> {
        let mut unsupported = Vec::new();
        for &mode in &self.strategies {
            match self.generate_with_retry(mode, request).await {
                Ok(raw) => {
                    debug!("{} answered in {} mode", self.backend.name(), mode);
                    return Ok(post_process(&raw));
                }
                Err(GenerateError::UnsupportedMode(reason)) => {
                    warn!("{} mode unavailable on {}: {}", mode, self.backend.name(), reason);
                    unsupported.push(format!("{}: {}", mode, reason));
                }
                Err(e) => return Err(Error::Generation(e.to_string())),
            }
        }
        Err(Error::Generation(format!(
            "No supported generation mode for {} ({})",
            self.backend.name(),
            unsupported.join("; ")
        )))
    }

    async fn generate_with_retry(
        &self,
        mode: GenerationMode,
        request: &PromptRequest,
    ) -> std::result::Result<String, GenerateError> {
        let mut attempt = 1;
        loop {
            match self.backend.generate(mode, request).await {
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let estimated_secs = match e {
                        GenerateError::ModelLoading { estimated_secs } => estimated_secs,
                        _ => None,
                    };
                    let delay = self.retry.delay_for(attempt - 1, estimated_secs);
                    warn!(
                        "Model loading (attempt {}/{}), retrying in {:?}",
                        attempt, self.retry.max_attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
