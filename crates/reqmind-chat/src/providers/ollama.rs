//! Local Ollama server.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{missing_field, post_json, TextGenerator};
use crate::config::GeneratorConfig;
use crate::error::GenerateError;
use crate::types::{GenerationMode, PromptRequest, SamplingParams};

/// Model served by a local Ollama instance. No credential.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    sampling: SamplingParams,
}

impl OllamaBackend {
    pub fn new(client: Client, config: &GeneratorConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            sampling: config.sampling,
        }
    }

    fn options(&self) -> serde_json::Value {
        json!({
            "num_predict": self.sampling.max_new_tokens,
            "temperature": self.sampling.temperature,
            "top_p": self.sampling.top_p,
            "repeat_penalty": self.sampling.repetition_penalty,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaBackend {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    async fn generate(
        &self,
        mode: GenerationMode,
        request: &PromptRequest,
    ) -> Result<String, GenerateError> {
        match mode {
            GenerationMode::Completion => {
                let body = json!({
                    "model": self.model,
                    "system": request.system,
                    "prompt": request.user,
                    "stream": false,
                    "options": self.options(),
                });
                let url = format!("{}/api/generate", self.base_url);
                let response = post_json(self.client.post(url), &body, &self.model).await?;
                response["response"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| missing_field(mode, &response))
            }
            GenerationMode::Chat => {
                let body = json!({
                    "model": self.model,
                    "messages": request.messages(),
                    "stream": false,
                    "options": self.options(),
                });
                let url = format!("{}/api/chat", self.base_url);
                let response = post_json(self.client.post(url), &body, &self.model).await?;
                response["message"]["content"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| missing_field(mode, &response))
            }
        }
    }
}
