//! ReqMind Store: persistent vector index over SQLite with in-memory cosine search.

pub mod embedding;
pub mod index;
pub mod schema;
pub mod types;

pub use index::VectorIndex;
pub use types::*;
