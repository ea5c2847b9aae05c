//! Generator configuration and backend selection.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::types::{GenerationMode, SamplingParams};
use reqmind_core::config::{parse_var, EnvLookup, ProcessEnv};
use reqmind_core::{Error, Result};

pub const DEFAULT_HF_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.3";
pub const DEFAULT_HF_BASE_URL: &str = "https://router.huggingface.co/hf-inference";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Prompt budget in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 6000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Generation backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Remote HuggingFace inference endpoint (needs an API key).
    HuggingFace,
    /// Local Ollama server.
    Ollama,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::HuggingFace => write!(f, "huggingface"),
            BackendKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" | "hf" | "remote" => Ok(Self::HuggingFace),
            "ollama" | "local" => Ok(Self::Ollama),
            other => Err(format!("unknown generator backend '{}'", other)),
        }
    }
}

/// Everything needed to build a [`crate::Generator`].
#[derive(Clone, PartialEq)]
pub struct GeneratorConfig {
    pub backend: BackendKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_input_chars: usize,
    pub sampling: SamplingParams,
    pub retry: RetryPolicy,
    /// Modes to try, in order.
    pub strategies: Vec<GenerationMode>,
    pub timeout: Duration,
}

impl GeneratorConfig {
    /// Defaults for `backend`, without credentials.
    pub fn for_backend(backend: BackendKind) -> Self {
        let (model, base_url) = match backend {
            BackendKind::HuggingFace => (DEFAULT_HF_MODEL, DEFAULT_HF_BASE_URL),
            BackendKind::Ollama => (DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_BASE_URL),
        };
        Self {
            backend,
            model: model.into(),
            base_url: base_url.into(),
            api_key: None,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            sampling: SamplingParams::default(),
            retry: RetryPolicy::default(),
            strategies: vec![GenerationMode::Completion, GenerationMode::Chat],
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Read generator settings. A HuggingFace backend without `HUGGINGFACE_API_KEY` is an error.
    pub fn from_lookup(env: &dyn EnvLookup) -> Result<Self> {
        let backend: BackendKind = parse_var(env, "REQMIND_GENERATOR", BackendKind::HuggingFace)?;
        let defaults = Self::for_backend(backend);
        let sampling_defaults = defaults.sampling;
        let retry_defaults = defaults.retry;

        let strategies = match env.get("REQMIND_GENERATION_MODES") {
            Some(raw) => raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.parse::<GenerationMode>().map_err(|e| {
                        Error::Config(format!("REQMIND_GENERATION_MODES has invalid value: {}", e))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => defaults.strategies,
        };

        let config = Self {
            backend,
            model: env.get("REQMIND_GENERATOR_MODEL").unwrap_or(defaults.model),
            base_url: env
                .get("REQMIND_GENERATOR_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            api_key: env.get("HUGGINGFACE_API_KEY"),
            max_input_chars: parse_var(env, "REQMIND_MAX_INPUT_CHARS", defaults.max_input_chars)?,
            sampling: SamplingParams {
                max_new_tokens: parse_var(
                    env,
                    "REQMIND_MAX_NEW_TOKENS",
                    sampling_defaults.max_new_tokens,
                )?,
                temperature: parse_var(env, "REQMIND_TEMPERATURE", sampling_defaults.temperature)?,
                top_p: parse_var(env, "REQMIND_TOP_P", sampling_defaults.top_p)?,
                repetition_penalty: parse_var(
                    env,
                    "REQMIND_REPETITION_PENALTY",
                    sampling_defaults.repetition_penalty,
                )?,
            },
            retry: RetryPolicy {
                max_attempts: parse_var(env, "REQMIND_RETRY_ATTEMPTS", retry_defaults.max_attempts)?,
                initial_delay: Duration::from_millis(parse_var(
                    env,
                    "REQMIND_RETRY_DELAY_MS",
                    retry_defaults.initial_delay.as_millis() as u64,
                )?),
                ..retry_defaults
            },
            strategies,
            timeout: Duration::from_secs(parse_var(
                env,
                "REQMIND_GENERATOR_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::HuggingFace && self.api_key.is_none() {
            return Err(Error::Config(
                "HUGGINGFACE_API_KEY is not set. Add it to your environment or .env file".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("generator model must not be empty".into()));
        }
        if self.strategies.is_empty() {
            return Err(Error::Config("at least one generation mode is required".into()));
        }
        if self.max_input_chars == 0 {
            return Err(Error::Config("REQMIND_MAX_INPUT_CHARS must be greater than zero".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("REQMIND_RETRY_ATTEMPTS must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.sampling.temperature) {
            return Err(Error::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.sampling.temperature
            )));
        }
        Ok(())
    }

    /// The key with all but its first 4 characters hidden.
    pub fn masked_api_key(&self) -> String {
        match &self.api_key {
            Some(key) if key.chars().count() > 4 => {
                format!("{}****", key.chars().take(4).collect::<String>())
            }
            Some(_) => "****".into(),
            None => "(not set)".into(),
        }
    }
}

impl fmt::Display for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modes: Vec<String> = self.strategies.iter().map(|m| m.to_string()).collect();
        write!(
            f,
            "{} model={} url={} key={} modes=[{}] max_new_tokens={} temperature={}",
            self.backend,
            self.model,
            self.base_url,
            self.masked_api_key(),
            modes.join(","),
            self.sampling.max_new_tokens,
            self.sampling.temperature
        )
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.masked_api_key())
            .field("max_input_chars", &self.max_input_chars)
            .field("sampling", &self.sampling)
            .field("retry", &self.retry)
            .field("strategies", &self.strategies)
            .field("timeout", &self.timeout)
            .finish()
    }
}
