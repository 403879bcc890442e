//! Job lifecycle — records, the store seam, and the manager that schedules
//! pipeline runs without blocking the submitter.
//!
//! Status moves strictly forward: queued → processing → completed | failed.
//! The store ignores transition calls on terminal jobs, so a late or
//! duplicated write can never regress a finished job.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::evaluation::pipeline::{self, PipelineContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One tracked evaluation request. `result` is populated only on
/// completion, `error` only on failure; both never at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn queued(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Handle returned to the submitter immediately, before the pipeline runs.
#[derive(Debug, Serialize)]
pub struct JobHandle {
    pub id: Uuid,
    pub status: JobStatus,
}

/// Storage seam for job records. The pipeline and handlers depend on this
/// trait, not on the map, so tests can observe transitions directly.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job);
    /// Pure lookup; returns a snapshot that does not alias store internals.
    async fn get(&self, id: Uuid) -> Option<Job>;
    async fn mark_processing(&self, id: Uuid);
    async fn complete(&self, id: Uuid, result: Value);
    async fn fail(&self, id: Uuid, error: String);
}

/// Process-lifetime map of all jobs. Records accumulate until restart.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a forward transition. Terminal and unknown jobs are left
    /// untouched.
    async fn transition(&self, id: Uuid, apply: impl FnOnce(&mut Job) + Send) {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if job.status.is_terminal() => {
                warn!("ignoring transition on terminal job {id}");
            }
            Some(job) => {
                apply(job);
                job.updated_at = Utc::now();
            }
            None => warn!("transition requested for unknown job {id}"),
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    async fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn mark_processing(&self, id: Uuid) {
        self.transition(id, |job| {
            job.status = JobStatus::Processing;
        })
        .await;
    }

    async fn complete(&self, id: Uuid, result: Value) {
        self.transition(id, |job| {
            job.status = JobStatus::Completed;
            job.result = Some(result);
        })
        .await;
    }

    async fn fail(&self, id: Uuid, error: String) {
        self.transition(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
        })
        .await;
    }
}

/// Creates jobs and schedules their pipeline runs.
#[derive(Clone)]
pub struct JobManager {
    ctx: Arc<PipelineContext>,
    start_delay: Duration,
}

impl JobManager {
    pub fn new(ctx: PipelineContext, start_delay: Duration) -> Self {
        Self {
            ctx: Arc::new(ctx),
            start_delay,
        }
    }

    /// Registers a queued job and spawns its pipeline run. Returns before
    /// the pipeline starts; the task handle is deliberately discarded
    /// (no cancellation API).
    pub async fn submit(&self, cv_path: PathBuf, report_path: PathBuf) -> JobHandle {
        let job = Job::queued(Uuid::new_v4());
        let handle = JobHandle {
            id: job.id,
            status: job.status,
        };

        self.ctx.store.insert(job).await;
        info!("job {} queued", handle.id);

        let ctx = Arc::clone(&self.ctx);
        let delay = self.start_delay;
        let id = handle.id;
        tokio::spawn(async move {
            // Grace period so the upload step finishes writing to disk
            // before extraction reads the files.
            tokio::time::sleep(delay).await;
            pipeline::execute(&ctx, id, &cv_path, &report_path).await;
        });

        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.ctx.store.get(id).await
    }
}
