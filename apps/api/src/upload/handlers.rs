//! Axum route handlers for document upload.

use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub cv_id: String,
    pub report_id: String,
    pub cv_path: String,
    pub report_path: String,
}

/// POST /api/upload
///
/// Accepts `cv` and `report` multipart fields (both required) and stores
/// each under a generated name, returning the ids that POST /api/evaluate
/// expects.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut cv: Option<StoredDocument> = None;
    let mut report: Option<StoredDocument> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "cv" => cv = Some(store_field(&state.config.upload_dir, field).await?),
            "report" => report = Some(store_field(&state.config.upload_dir, field).await?),
            _ => continue,
        }
    }

    let (Some(cv), Some(report)) = (cv, report) else {
        return Err(AppError::Validation("Missing CV or Report".to_string()));
    };

    Ok(Json(UploadResponse {
        cv_id: cv.id,
        report_id: report.id,
        cv_path: cv.path.display().to_string(),
        report_path: report.path.display().to_string(),
    }))
}

struct StoredDocument {
    id: String,
    path: PathBuf,
}

/// Persists one multipart field under a collision-resistant name, keeping
/// the original extension so the extractor can pick a parser.
async fn store_field(upload_dir: &Path, field: Field<'_>) -> Result<StoredDocument, AppError> {
    let ext = field
        .file_name()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let data: Bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;

    let id = format!("{}{ext}", Uuid::new_v4());
    let path = upload_dir.join(&id);

    tokio::fs::write(&path, &data)
        .await
        .with_context(|| format!("writing upload to {}", path.display()))?;

    info!("stored upload {id} ({} bytes)", data.len());

    Ok(StoredDocument { id, path })
}
