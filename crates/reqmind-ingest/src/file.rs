//! Document loading: corpus directory → cleaned text documents.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use reqmind_core::{Error, Result};

/// Supported file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    PlainText,
    Markdown,
    Pdf,
    Unsupported,
}

impl FileType {
    /// Detect file type from extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" => Self::PlainText,
            "md" | "markdown" => Self::Markdown,
            "pdf" => Self::Pdf,
            _ => Self::Unsupported,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unsupported)
    }
}

/// A unit of loaded text with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub text: String,
    /// File name within the corpus directory.
    pub source: String,
    /// 1-based page number, for PDFs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// Load every supported file in `dir`, ordered by file name.
///
/// Unsupported, empty and unreadable files are skipped. Only a missing directory is an error.
pub fn load_directory(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "Corpus directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut documents = Vec::new();
    for path in &paths {
        if FileType::from_path(path) == FileType::Unsupported {
            debug!("Skipping unsupported file {}", path.display());
            continue;
        }
        match load_file(path) {
            Ok(docs) if docs.is_empty() => debug!("No text in {}", path.display()),
            Ok(docs) => documents.extend(docs),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    info!(
        "Loaded {} documents from {} files in {}",
        documents.len(),
        paths.len(),
        dir.display()
    );
    Ok(documents)
}

/// Load one file as zero or more documents. PDFs give one document per non-empty page.
pub fn load_file(path: &Path) -> Result<Vec<Document>> {
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match FileType::from_path(path) {
        FileType::PlainText | FileType::Markdown => {
            let text = clean_text(&std::fs::read_to_string(path)?);
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![Document {
                text,
                source,
                page: None,
            }])
        }
        FileType::Pdf => {
            let pages = extract_pdf_pages(path)?;
            Ok(pages
                .iter()
                .enumerate()
                .map(|(i, page)| (i, clean_text(page)))
                .filter(|(_, text)| !text.trim().is_empty())
                .map(|(i, text)| Document {
                    text,
                    source: source.clone(),
                    page: Some(i as u32 + 1),
                })
                .collect())
        }
        FileType::Unsupported => Ok(Vec::new()),
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    // pdf-extract panics on some malformed files
    let path_buf = path.to_path_buf();
    match std::panic::catch_unwind(move || pdf_extract::extract_text_by_pages(&path_buf)) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(Error::Ingest(format!("PDF extraction failed: {}", e))),
        Err(_) => Err(Error::Ingest("PDF extraction panicked".into())),
    }
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    Err(Error::Ingest(format!(
        "PDF support not compiled in, skipping {}",
        path.display()
    )))
}

/// Remove NUL bytes and normalize line endings to `\n`.
pub fn clean_text(raw: &str) -> String {
    raw.replace('\0', "").replace("\r\n", "\n").replace('\r', "\n")
}
