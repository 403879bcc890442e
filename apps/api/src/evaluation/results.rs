//! Result persistence — completed evaluations are mirrored to disk as one
//! pretty-printed JSON file per job, alongside the in-memory job record.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn write(&self, job_id: Uuid, result: &Value) -> Result<()>;
}

/// Writes results into a flat directory as `<job_id>.json`.
pub struct FsResultStore {
    dir: PathBuf,
}

impl FsResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ResultStore for FsResultStore {
    async fn write(&self, job_id: Uuid, result: &Value) -> Result<()> {
        let path = self.dir.join(format!("{job_id}.json"));
        let body = serde_json::to_vec_pretty(result)?;

        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("writing result to {}", path.display()))?;

        debug!("result for job {job_id} written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_written_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path());
        let job_id = Uuid::new_v4();
        let result = json!({"cv_match_rate": 0.8, "overall_summary": "strong"});

        store.write(job_id, &result).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(format!("{job_id}.json"))).unwrap();
        let parsed: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, result);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsResultStore::new(dir.path().join("nope"));

        let err = store.write(Uuid::new_v4(), &json!({})).await.unwrap_err();
        assert!(err.to_string().contains("writing result"));
    }
}
