//! Document upload and id resolution. Uploads land in a flat directory
//! under generated names; the returned ids double as file names for the
//! evaluate endpoint.

pub mod handlers;

use std::path::{Path, PathBuf};

use crate::errors::AppError;

/// Maps an opaque document id from an earlier upload to a path inside the
/// upload directory. Ids are bare file names; anything that could escape
/// the directory is rejected.
pub fn resolve_document(upload_dir: &Path, id: &str) -> Result<PathBuf, AppError> {
    if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
        return Err(AppError::Validation(format!("Invalid document id: {id}")));
    }
    Ok(upload_dir.join(id))
}
