//! HuggingFace inference endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{missing_field, post_json, TextGenerator};
use crate::config::GeneratorConfig;
use crate::error::GenerateError;
use crate::types::{GenerationMode, PromptRequest, SamplingParams};

/// Remote model behind the HuggingFace inference API, authenticated with a bearer token.
pub struct HuggingFaceBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    sampling: SamplingParams,
}

impl HuggingFaceBackend {
    pub fn new(client: Client, config: &GeneratorConfig, api_key: String) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            sampling: config.sampling,
        }
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    async fn completion(&self, request: &PromptRequest) -> Result<String, GenerateError> {
        let body = json!({
            "inputs": request.completion_text(),
            "parameters": {
                "max_new_tokens": self.sampling.max_new_tokens,
                "temperature": self.sampling.temperature,
                "top_p": self.sampling.top_p,
                "repetition_penalty": self.sampling.repetition_penalty,
                "return_full_text": false,
            },
        });
        let response = post_json(
            self.client.post(self.model_url()).bearer_auth(&self.api_key),
            &body,
            &self.model,
        )
        .await?;

        // Either [{"generated_text": ...}] or {"generated_text": ...}
        let generated = match &response {
            Value::Array(items) => items.first().and_then(|v| v["generated_text"].as_str()),
            other => other["generated_text"].as_str(),
        };
        generated
            .map(str::to_string)
            .ok_or_else(|| missing_field(GenerationMode::Completion, &response))
    }

    async fn chat(&self, request: &PromptRequest) -> Result<String, GenerateError> {
        let body = json!({
            "model": self.model,
            "messages": request.messages(),
            "max_tokens": self.sampling.max_new_tokens,
            "temperature": self.sampling.temperature,
            "top_p": self.sampling.top_p,
            "stream": false,
        });
        let url = format!("{}/v1/chat/completions", self.model_url());
        let response = post_json(
            self.client.post(url).bearer_auth(&self.api_key),
            &body,
            &self.model,
        )
        .await?;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| missing_field(GenerationMode::Chat, &response))
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceBackend {
    fn name(&self) -> String {
        format!("huggingface:{}", self.model)
    }

    async fn generate(
        &self,
        mode: GenerationMode,
        request: &PromptRequest,
    ) -> Result<String, GenerateError> {
        match mode {
            GenerationMode::Completion => self.completion(request).await,
            GenerationMode::Chat => self.chat(request).await,
        }
    }
}
