//! Answer generation for retrieval-augmented question answering.
//!
//! A `Generator` renders nothing itself: it takes a `PromptRequest` built by
//! [`prompt::build_prompt`] and sends it to a `TextGenerator` backend, trying
//! generation modes in order and retrying while the model is loading.
//! LLM calls go to a remote HuggingFace endpoint or a local Ollama server.

pub mod config;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod types;

pub use config::{BackendKind, GeneratorConfig};
pub use error::GenerateError;
pub use generator::Generator;
pub use prompt::{build_prompt, post_process, ContextPassage};
pub use providers::{build_backend, HuggingFaceBackend, OllamaBackend, TextGenerator};
pub use retry::RetryPolicy;
pub use types::*;
