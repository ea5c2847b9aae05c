//! Ingestion pipeline: corpus directory → documents → deduplicated chunks.

use std::collections::HashSet;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::chunking::{ChunkStats, Chunker, TextChunk};
use crate::file::{self, Document};
use reqmind_core::{AppConfig, Result};

/// Result of chunking a corpus.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub chunks: Vec<TextChunk>,
    /// Documents that were chunked.
    pub documents: usize,
    /// Documents skipped because their content was already seen.
    pub duplicates: usize,
    pub stats: ChunkStats,
}

/// Turns documents into chunks, indexing identical content once.
pub struct Ingester {
    chunker: Chunker,
}

impl Ingester {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(Chunker::new(config.chunk_size, config.chunk_overlap)?))
    }

    /// Load and chunk every supported file in `dir`.
    pub fn ingest_directory(&self, dir: &Path) -> Result<IngestReport> {
        let documents = file::load_directory(dir)?;
        Ok(self.ingest_documents(&documents))
    }

    /// Chunk `documents` in order, skipping any whose content hash was already seen.
    pub fn ingest_documents(&self, documents: &[Document]) -> IngestReport {
        let mut seen = HashSet::new();
        let mut report = IngestReport::default();
        debug!(
            "Chunking {} documents (size={}, overlap={})",
            documents.len(),
            self.chunker.chunk_size(),
            self.chunker.chunk_overlap()
        );

        for doc in documents {
            let hash = content_hash(&doc.text);
            if !seen.insert(hash) {
                debug!(
                    "Duplicate content, skipping: {}{}",
                    doc.source,
                    doc.page.map(|p| format!(" page {}", p)).unwrap_or_default()
                );
                report.duplicates += 1;
                continue;
            }
            let before = report.chunks.len();
            report.chunks.extend(self.chunker.chunks(doc));
            debug!("Chunked {} into {} chunks", doc.source, report.chunks.len() - before);
            report.documents += 1;
        }

        report.stats = ChunkStats::from_chunks(&report.chunks);
        info!(
            "Ingested {} documents into {} chunks ({} duplicates skipped)",
            report.documents, report.stats.total, report.duplicates
        );
        report
    }
}

/// Compute SHA-256 content hash.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
