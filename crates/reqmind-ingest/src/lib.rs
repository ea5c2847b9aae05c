//! ReqMind Ingest: document loading, text cleaning and chunking.

pub mod chunking;
pub mod file;
pub mod ingest;

pub use chunking::{ChunkStats, Chunker, Chunks, TextChunk};
pub use file::{load_directory, Document, FileType};
pub use ingest::{content_hash, IngestReport, Ingester};
