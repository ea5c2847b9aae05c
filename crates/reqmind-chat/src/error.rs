//! Backend failure kinds.

use thiserror::Error;

/// Why a backend could not produce text.
///
/// Only [`GenerateError::UnsupportedMode`] moves the generator to its next mode, and only
/// [`GenerateError::ModelLoading`] is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerateError {
    #[error("Generation mode not supported: {0}")]
    UnsupportedMode(String),

    #[error("Model is currently loading{}. Please wait a minute and try again.", estimated_suffix(.estimated_secs))]
    ModelLoading { estimated_secs: Option<f64> },

    #[error("Invalid API key: {0}")]
    Unauthorized(String),

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimited,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

fn estimated_suffix(estimated_secs: &Option<f64>) -> String {
    match estimated_secs {
        Some(secs) => format!(" (estimated {:.0}s)", secs),
        None => String::new(),
    }
}

impl GenerateError {
    /// Map a non-success HTTP response to an error kind.
    ///
    /// 405, and 400/404/422 whose text says the task is unsupported, mean the endpoint does
    /// not offer this mode. 503 with a loading message is a cold model.
    pub fn from_status(status: u16, body: &str, model: &str) -> Self {
        let message = error_message(body);
        let lower = message.to_lowercase();

        match status {
            405 => Self::UnsupportedMode(message),
            400 | 404 | 422 if mentions_unsupported(&lower) => Self::UnsupportedMode(message),
            401 | 403 => Self::Unauthorized(message),
            404 => Self::NotFound(format!("{} ({})", model, message)),
            410 => Self::NotFound(format!("{} is no longer available (410 Gone)", model)),
            429 => Self::RateLimited,
            503 if lower.contains("loading") => Self::ModelLoading {
                estimated_secs: serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v["estimated_time"].as_f64()),
            },
            _ => Self::Api { status, message },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ModelLoading { .. })
    }
}

fn mentions_unsupported(lower: &str) -> bool {
    ["not supported", "unsupported", "does not support", "not a chat model"]
        .iter()
        .any(|p| lower.contains(p))
}

/// Pull `error` or `error.message` out of a JSON body, else use the raw text.
fn error_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = v["error"].as_str() {
            return msg.to_string();
        }
        if let Some(msg) = v["error"]["message"].as_str() {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error details".into()
    } else {
        trimmed.chars().take(300).collect()
    }
}
