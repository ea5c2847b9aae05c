//! Fixed-window text chunking with overlap.
//!
//! Windows are measured in characters (Unicode scalar values), so a chunk never splits a code
//! point. Consecutive chunks share exactly `chunk_overlap` characters.

use serde::Serialize;

use crate::file::Document;
use reqmind_core::{Error, Result};

/// A chunk of a document with position metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    pub text: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Position within the document, starting at 0.
    pub chunk_index: usize,
    /// Character offset of the first char, inclusive.
    pub start_char: usize,
    /// Character offset past the last char.
    pub end_char: usize,
}

/// Splits documents into overlapping windows of `chunk_size` characters.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Fails when `chunk_size` is zero or `chunk_overlap` is not smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Lazily iterate over the chunks of `doc`.
    pub fn chunks<'a>(&'a self, doc: &'a Document) -> Chunks<'a> {
        Chunks {
            chunker: self,
            doc,
            start_byte: 0,
            start_char: 0,
            index: 0,
            done: doc.text.is_empty(),
        }
    }
}

/// Iterator returned by [`Chunker::chunks`].
pub struct Chunks<'a> {
    chunker: &'a Chunker,
    doc: &'a Document,
    start_byte: usize,
    start_char: usize,
    index: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = TextChunk;

    fn next(&mut self) -> Option<TextChunk> {
        if self.done {
            return None;
        }
        let text = &self.doc.text;
        let rest = &text[self.start_byte..];
        let size = self.chunker.chunk_size;
        let stride = size - self.chunker.chunk_overlap;

        let end = rest
            .char_indices()
            .nth(size)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..end];
        let window_chars = window.chars().count();

        let chunk = TextChunk {
            text: window.to_string(),
            source: self.doc.source.clone(),
            page: self.doc.page,
            chunk_index: self.index,
            start_char: self.start_char,
            end_char: self.start_char + window_chars,
        };

        if self.start_byte + end == text.len() {
            self.done = true;
        } else {
            // The window was full, so `rest` has more than `size > stride` chars.
            let advance = rest
                .char_indices()
                .nth(stride)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
            self.start_byte += advance;
            self.start_char += stride;
        }
        self.index += 1;
        Some(chunk)
    }
}

/// Summary of chunk lengths, in characters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkStats {
    pub total: usize,
    pub avg_chars: f64,
    pub min_chars: usize,
    pub max_chars: usize,
}

impl ChunkStats {
    pub fn from_chunks(chunks: &[TextChunk]) -> Self {
        if chunks.is_empty() {
            return Self::default();
        }
        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        Self {
            total: chunks.len(),
            avg_chars: lengths.iter().sum::<usize>() as f64 / chunks.len() as f64,
            min_chars: lengths.iter().copied().min().unwrap_or(0),
            max_chars: lengths.iter().copied().max().unwrap_or(0),
        }
    }
}
