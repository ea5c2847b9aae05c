//! Generation request types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a prompt is sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Single-shot text completion of the full prompt.
    Completion,
    /// Chat exchange: system instruction plus one user message.
    Chat,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationMode::Completion => write!(f, "completion"),
            GenerationMode::Chat => write!(f, "chat"),
        }
    }
}

impl FromStr for GenerationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "completion" | "text" => Ok(Self::Completion),
            "chat" => Ok(Self::Chat),
            other => Err(format!("unknown generation mode '{}'", other)),
        }
    }
}

/// Chat message sent to chat-style endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// A rendered prompt, ready for either generation mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    /// Instruction header.
    pub system: String,
    /// Context blocks, the question and the `Answer:` cue.
    pub user: String,
    /// Context passages that survived truncation.
    pub context_used: usize,
}

impl PromptRequest {
    /// The prompt as one text, for completion endpoints.
    pub fn completion_text(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }

    /// The prompt as chat messages.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }
}

/// Sampling parameters passed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 300,
            temperature: 0.5,
            top_p: 0.9,
            repetition_penalty: 1.2,
        }
    }
}
