//! Axum route handlers for the Evaluation API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluation::jobs::{Job, JobHandle};
use crate::state::AppState;
use crate::upload::resolve_document;

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub cv_id: Option<String>,
    pub report_id: Option<String>,
}

/// POST /api/evaluate
///
/// Validates the document ids, resolves them to upload paths and submits a
/// job. Returns `{ id, status: "queued" }` before the pipeline starts.
/// Identical ids on repeated calls produce independent jobs.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<JobHandle>, AppError> {
    let cv_id = request.cv_id.as_deref().filter(|s| !s.trim().is_empty());
    let report_id = request.report_id.as_deref().filter(|s| !s.trim().is_empty());

    let (Some(cv_id), Some(report_id)) = (cv_id, report_id) else {
        return Err(AppError::Validation("Missing document IDs".to_string()));
    };

    let cv_path = resolve_document(&state.config.upload_dir, cv_id)?;
    let report_path = resolve_document(&state.config.upload_dir, report_id)?;

    let handle = state.jobs.submit(cv_path, report_path).await;
    Ok(Json(handle))
}

/// GET /api/result/:id
///
/// Pure status lookup. Terminal jobs serialize identically on every call.
pub async fn handle_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, AppError> {
    let job = match Uuid::parse_str(&id) {
        Ok(job_id) => state.jobs.get(job_id).await,
        Err(_) => None,
    };

    let job = job.ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;
    Ok(Json(job))
}
