//! Text extraction — turns an uploaded document into plain text.
//!
//! The pipeline depends on the `TextExtractor` trait, not the concrete
//! implementation, so tests substitute fixed-text fakes without touching
//! the filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Minimum plausible document size in bytes. Anything smaller is treated
/// as a truncated or failed upload rather than a real document.
const MIN_DOCUMENT_BYTES: u64 = 100;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("file unreadable: {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file seems empty or invalid ({len} bytes): {}", .path.display())]
    TooSmall { path: PathBuf, len: u64 },

    #[error("failed to extract text from {}: {reason}", .path.display())]
    Unparsable { path: PathBuf, reason: String },

    #[error("document produced no text: {}", .0.display())]
    Empty(PathBuf),
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Default extractor: PDF via `pdf-extract`, anything else read as UTF-8
/// plain text.
pub struct DocumentExtractor;

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = read_checked(path).await?;
        let len = bytes.len();

        let text = if has_pdf_extension(path) {
            let owned = path.to_path_buf();
            // pdf-extract is CPU-bound; keep it off the async workers.
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| ExtractionError::Unparsable {
                    path: owned.clone(),
                    reason: e.to_string(),
                })?
                .map_err(|e| ExtractionError::Unparsable {
                    path: owned,
                    reason: e.to_string(),
                })?
        } else {
            String::from_utf8(bytes).map_err(|_| ExtractionError::Unparsable {
                path: path.to_path_buf(),
                reason: "not valid UTF-8".to_string(),
            })?
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::Empty(path.to_path_buf()));
        }

        debug!(
            "extracted {} chars from {} ({} KB)",
            text.len(),
            path.display(),
            len / 1024
        );

        Ok(text)
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

/// Reads the file after checking it exists and clears the size threshold.
async fn read_checked(path: &Path) -> Result<Vec<u8>, ExtractionError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractionError::NotFound(path.to_path_buf())
        } else {
            ExtractionError::Unreadable {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    if meta.len() < MIN_DOCUMENT_BYTES {
        return Err(ExtractionError::TooSmall {
            path: path.to_path_buf(),
            len: meta.len(),
        });
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| ExtractionError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })
}
