//! Data types for index entries, search hits and statistics.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// An entry to append to the index.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub text: String,
    /// File name of the originating document.
    pub source: String,
    /// 1-based page number for paged formats.
    pub page: Option<u32>,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    pub embedding: Array1<f32>,
}

/// A stored entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Opaque identifier assigned by the index.
    pub id: i64,
    pub text: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub chunk_index: usize,
    pub created_at: i64,
}

/// A search result: the entry plus its cosine distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub entry: IndexEntry,
    /// `1 - cosine similarity`; 0 is identical direction.
    pub distance: f32,
}

/// What the index was built with. Persisted in `index_meta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub schema_version: u32,
    pub model_id: String,
    pub dimension: usize,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// Index-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub entries: usize,
    pub sources: usize,
    pub model_id: String,
    pub dimension: usize,
    pub db_path: String,
    pub db_size_mb: f64,
    pub matrix_rows: usize,
}
