//! Runtime types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Pipeline stage of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStage {
    /// Embed the question.
    Embedding,
    /// Search the vector index.
    Retrieving,
    /// Build the prompt and call the generator.
    Generating,
    Done,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStage::Embedding => write!(f, "embedding"),
            QueryStage::Retrieving => write!(f, "retrieval"),
            QueryStage::Generating => write!(f, "generation"),
            QueryStage::Done => write!(f, "done"),
        }
    }
}

/// A failed query, tagged with the stage that failed.
#[derive(Error, Debug)]
#[error("Query failed during {stage}: {source}")]
pub struct QueryError {
    pub stage: QueryStage,
    #[source]
    pub source: reqmind_core::Error,
}

impl QueryError {
    pub fn new(stage: QueryStage, source: reqmind_core::Error) -> Self {
        Self { stage, source }
    }
}

/// Where part of an answer came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceCitation {
    /// File name of the source document.
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Leading excerpt of the retrieved chunk.
    pub snippet: String,
    /// Cosine distance to the question.
    pub distance: f32,
}

/// Answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub answer: String,
    /// Retrieved chunks in rank order.
    pub sources: Vec<SourceCitation>,
}
