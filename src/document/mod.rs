//! PDF loading into page-level documents.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while reading the source corpus.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The configured document path does not exist.
    #[error("Document not found: {0}")]
    NotFound(PathBuf),
    /// The PDF could not be decoded.
    #[error("Failed to extract text from {path}: {message}")]
    Extraction {
        /// File being read.
        path: PathBuf,
        /// Extractor diagnostic.
        message: String,
    },
}

/// Provenance attached to a page or chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    /// Path of the source file.
    pub source: String,
    /// Zero-based page index.
    pub page: usize,
    /// Byte offset of a chunk inside its page; `None` for whole pages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
}

/// Text with provenance metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    /// Text content.
    pub page_content: String,
    /// Provenance.
    pub metadata: DocumentMetadata,
}

/// Extract one [`Document`] per page of the PDF at `path`.
///
/// Extraction is CPU-bound and runs on the blocking pool. Pages without text are kept so that
/// page indexes line up with the source file.
pub async fn load_pdf(path: impl AsRef<Path>) -> Result<Vec<Document>, LoaderError> {
    let path = path.as_ref().to_path_buf();
    if !path.is_file() {
        return Err(LoaderError::NotFound(path));
    }

    let extract_path = path.clone();
    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_by_pages(&extract_path).map_err(|error| error.to_string())
    })
    .await
    .map_err(|error| LoaderError::Extraction {
        path: path.clone(),
        message: error.to_string(),
    })?
    .map_err(|message| LoaderError::Extraction {
        path: path.clone(),
        message,
    })?;

    let documents = pages_to_documents(&path.to_string_lossy(), pages);
    tracing::info!(
        source = %path.display(),
        pages = documents.len(),
        "Loaded PDF"
    );
    Ok(documents)
}

/// Wrap raw page texts into documents, normalizing line endings.
pub fn pages_to_documents(source: &str, pages: Vec<String>) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| Document {
            page_content: text.replace("\r\n", "\n"),
            metadata: DocumentMetadata {
                source: source.to_string(),
                page,
                start_index: None,
            },
        })
        .collect()
}
