//! Runtime orchestrator: coordinates ingestion and the per-query pipeline.
//!
//! Ingestion embeds chunks into the vector index. Each query flows through
//! embedding, retrieval and generation, and returns an answer with citations.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{QueryOptions, QueryOrchestrator};
pub use types::*;
