//! The per-job evaluation pipeline: existence check → extraction →
//! scoring → parse → persist → complete.
//!
//! Steps 1–3 may fail the job. Everything after scoring is absorbing:
//! an unparsable response becomes a `{ "raw": ... }` result and the job
//! still completes ("never lose the LLM's answer").

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::evaluation::jobs::JobStore;
use crate::evaluation::prompts::PromptInputs;
use crate::evaluation::results::ResultStore;
use crate::evaluation::scoring::{EvaluationLlm, EvaluationScores};
use crate::extract::TextExtractor;
use crate::llm_client::strip_json_fences;

/// Everything a pipeline run needs, shared across all jobs.
pub struct PipelineContext {
    pub store: Arc<dyn JobStore>,
    pub extractor: Arc<dyn TextExtractor>,
    pub llm: EvaluationLlm,
    pub results: Arc<dyn ResultStore>,
    pub references: ReferenceDocs,
}

/// Paths of the three fixed reference documents.
#[derive(Debug, Clone)]
pub struct ReferenceDocs {
    pub job_description: PathBuf,
    pub case_study: PathBuf,
    pub rubric: PathBuf,
}

impl ReferenceDocs {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            job_description: dir.join("job_description.pdf"),
            case_study: dir.join("case_study_brief.pdf"),
            rubric: dir.join("scoring_rubric.pdf"),
        }
    }
}

/// Runs one job to a terminal state. Never panics and never returns an
/// error; every outcome lands in the job store.
pub async fn execute(ctx: &PipelineContext, job_id: Uuid, cv_path: &Path, report_path: &Path) {
    info!("job {job_id} starting evaluation");
    ctx.store.mark_processing(job_id).await;

    match run(ctx, job_id, cv_path, report_path).await {
        Ok(()) => info!("job {job_id} completed"),
        Err(e) => {
            error!("job {job_id} failed: {e}");
            ctx.store.fail(job_id, e.to_string()).await;
        }
    }
}

async fn run(
    ctx: &PipelineContext,
    job_id: Uuid,
    cv_path: &Path,
    report_path: &Path,
) -> anyhow::Result<()> {
    // Step 1: both candidate documents must already be on disk.
    for path in [cv_path, report_path] {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            anyhow::bail!("file not found: {}", path.display());
        }
    }

    // Step 2: candidate and reference extractions have no ordering
    // dependency, so all five are issued together and awaited jointly.
    let refs = &ctx.references;
    let (cv_text, report_text, job_desc, case_study, rubric) = tokio::try_join!(
        ctx.extractor.extract(cv_path),
        ctx.extractor.extract(report_path),
        ctx.extractor.extract(&refs.job_description),
        ctx.extractor.extract(&refs.case_study),
        ctx.extractor.extract(&refs.rubric),
    )?;

    // Step 3: one scoring call; provider fallback happens inside.
    let inputs = PromptInputs {
        cv_text,
        report_text,
        job_desc,
        case_study,
        rubric,
    };
    let response = ctx.llm.score(&inputs).await?;

    // Step 4: parse, wrapping anything unparsable. Nothing below this
    // line may fail the job.
    let result = parse_result(&response);

    // Step 5: mirror the result to the result store.
    if let Err(e) = ctx.results.write(job_id, &result).await {
        error!("job {job_id}: result write failed: {e:#}");
    }

    // Step 6
    ctx.store.complete(job_id, result).await;
    Ok(())
}

/// Parses a scoring response into the result schema. Anything that does
/// not parse is kept verbatim under `{ "raw": ... }`.
fn parse_result(response: &str) -> Value {
    let clean = strip_json_fences(response);
    match serde_json::from_str::<EvaluationScores>(clean) {
        Ok(scores) => serde_json::to_value(scores)
            .unwrap_or_else(|_| json!({ "raw": response.trim() })),
        Err(e) => {
            warn!("response is not valid result JSON ({e}), storing raw text");
            json!({ "raw": response.trim() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::jobs::{InMemoryJobStore, Job, JobManager, JobStatus};
    use crate::extract::ExtractionError;
    use crate::llm_client::{ChatProvider, ProviderError};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    const VALID_JSON: &str = r#"{"cv_match_rate":0.8,"cv_feedback":"relevant stack","project_score":4.5,"project_feedback":"clean architecture","overall_summary":"Strong candidate overall."}"#;

    /// Replays scripted outcomes; panics when called more than scripted.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<String, String>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedProvider {
        fn replying(responses: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
                calls: Mutex::new(0),
            })
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn complete(
            &self,
            _model: &str,
            _temperature: f32,
            _prompt: &str,
        ) -> Result<String, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(ProviderError::Api {
                    status: 503,
                    message,
                }),
                None => panic!("provider called more times than scripted"),
            }
        }
    }

    /// Returns canned text for every path, or an error for one marked path.
    struct FakeExtractor {
        failing: Option<PathBuf>,
    }

    #[async_trait]
    impl crate::extract::TextExtractor for FakeExtractor {
        async fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
            if self.failing.as_deref() == Some(path) {
                return Err(ExtractionError::Empty(path.to_path_buf()));
            }
            Ok(format!("text of {}", path.display()))
        }
    }

    /// Captures writes instead of touching the filesystem.
    #[derive(Default)]
    struct MemoryResultStore {
        writes: Mutex<Vec<(Uuid, Value)>>,
    }

    #[async_trait]
    impl ResultStore for MemoryResultStore {
        async fn write(&self, job_id: Uuid, result: &Value) -> anyhow::Result<()> {
            self.writes.lock().unwrap().push((job_id, result.clone()));
            Ok(())
        }
    }

    struct Harness {
        ctx: PipelineContext,
        primary: Arc<ScriptedProvider>,
        secondary: Arc<ScriptedProvider>,
        results: Arc<MemoryResultStore>,
        // Keeps the candidate fixture files alive for the test's duration.
        _dir: tempfile::TempDir,
        cv_path: PathBuf,
        report_path: PathBuf,
    }

    fn harness(
        primary: Arc<ScriptedProvider>,
        secondary: Arc<ScriptedProvider>,
        failing_extraction: Option<&str>,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let cv_path = dir.path().join("cv.pdf");
        let report_path = dir.path().join("report.pdf");
        std::fs::write(&cv_path, b"fixture").unwrap();
        std::fs::write(&report_path, b"fixture").unwrap();

        let results = Arc::new(MemoryResultStore::default());
        let references = ReferenceDocs::in_dir(Path::new("refs"));
        let failing = failing_extraction.map(|name| Path::new("refs").join(name));

        let ctx = PipelineContext {
            store: Arc::new(InMemoryJobStore::new()),
            extractor: Arc::new(FakeExtractor { failing }),
            llm: EvaluationLlm::new(
                Arc::clone(&primary) as Arc<dyn ChatProvider>,
                "cloud-model".to_string(),
                Some(Arc::clone(&secondary) as Arc<dyn ChatProvider>),
                "local-model".to_string(),
            ),
            results: Arc::clone(&results) as Arc<dyn ResultStore>,
            references,
        };

        Harness {
            ctx,
            primary,
            secondary,
            results,
            _dir: dir,
            cv_path,
            report_path,
        }
    }

    async fn run_job(h: &Harness) -> Job {
        let id = Uuid::new_v4();
        h.ctx.store.insert(Job::queued(id)).await;
        execute(&h.ctx, id, &h.cv_path, &h.report_path).await;
        h.ctx.store.get(id).await.unwrap()
    }

    #[tokio::test]
    async fn test_valid_primary_response_completes_with_that_object() {
        let h = harness(
            ScriptedProvider::replying(vec![Ok(VALID_JSON)]),
            ScriptedProvider::replying(vec![]),
            None,
        );

        let job = run_job(&h).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(serde_json::from_str(VALID_JSON).unwrap()));
        assert!(job.error.is_none());
        assert_eq!(h.secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_cv_fails_with_path_in_error() {
        let mut h = harness(
            ScriptedProvider::replying(vec![]),
            ScriptedProvider::replying(vec![]),
            None,
        );
        std::fs::remove_file(&h.cv_path).unwrap();
        h.cv_path = h._dir.path().join("gone.pdf");

        let job = run_job(&h).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("gone.pdf"));
        assert!(job.result.is_none());
        // Never reached the providers.
        assert_eq!(h.primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_primary_failure_completes_via_secondary() {
        let h = harness(
            ScriptedProvider::replying(vec![Err("rate limited")]),
            ScriptedProvider::replying(vec![Ok(VALID_JSON)]),
            None,
        );

        let job = run_job(&h).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(serde_json::from_str(VALID_JSON).unwrap()));
        // One primary attempt, no normalization call.
        assert_eq!(h.primary.call_count(), 1);
        assert_eq!(h.secondary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_prose_with_failed_normalization_completes_raw() {
        let prose = "This candidate is a reasonable fit for the role.";
        let h = harness(
            ScriptedProvider::replying(vec![Ok(prose), Err("overloaded")]),
            ScriptedProvider::replying(vec![]),
            None,
        );

        let job = run_job(&h).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(json!({ "raw": prose })));
    }

    #[tokio::test]
    async fn test_dual_provider_failure_fails_job() {
        let h = harness(
            ScriptedProvider::replying(vec![Err("unauthorized")]),
            ScriptedProvider::replying(vec![Err("connection refused")]),
            None,
        );

        let job = run_job(&h).await;

        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert!(error.contains("unauthorized"));
        assert!(error.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_reference_extraction_failure_fails_job() {
        let h = harness(
            ScriptedProvider::replying(vec![]),
            ScriptedProvider::replying(vec![]),
            Some("scoring_rubric.pdf"),
        );

        let job = run_job(&h).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("scoring_rubric.pdf"));
        assert_eq!(h.primary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_completed_result_is_mirrored_to_result_store() {
        let h = harness(
            ScriptedProvider::replying(vec![Ok(VALID_JSON)]),
            ScriptedProvider::replying(vec![]),
            None,
        );

        let job = run_job(&h).await;

        let writes = h.results.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, job.id);
        assert_eq!(Some(&writes[0].1), job.result.as_ref());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_returns_queued_and_completes_in_background() {
        let h = harness(
            ScriptedProvider::replying(vec![Ok(VALID_JSON)]),
            ScriptedProvider::replying(vec![]),
            None,
        );
        let cv = h.cv_path.clone();
        let report = h.report_path.clone();
        let manager = JobManager::new(h.ctx, Duration::from_millis(3000));

        let handle = manager.submit(cv, report).await;
        assert_eq!(handle.status, JobStatus::Queued);

        // The start delay is still pending, so the job has not moved.
        let job = manager.get(handle.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);

        // Paused clock: the start delay auto-advances, so this converges
        // without real waiting.
        let job = loop {
            let job = manager.get(handle.id).await.unwrap();
            if job.status.is_terminal() {
                break job;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        };

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(serde_json::from_str(VALID_JSON).unwrap()));
    }

    #[test]
    fn test_parse_result_accepts_fenced_json() {
        let fenced = format!("```json\n{VALID_JSON}\n```");
        let value = parse_result(&fenced);
        assert_eq!(value["cv_match_rate"], 0.8);
        assert!(value.get("raw").is_none());
    }

    #[test]
    fn test_parse_result_wraps_partial_schema_as_raw() {
        // Valid JSON but not the full schema: wrapped, never half-stored.
        let partial = r#"{"cv_match_rate": 0.8}"#;
        let value = parse_result(partial);
        assert_eq!(value, json!({ "raw": partial }));
    }

    #[test]
    fn test_parse_result_wraps_prose_as_raw() {
        let value = parse_result("  not json at all\n");
        assert_eq!(value, json!({ "raw": "not json at all" }));
    }
}
