use crate::config::Config;
use crate::evaluation::jobs::JobManager;

/// Shared application state injected into all route handlers via Axum
/// extractors. The job manager carries the pipeline dependencies; handlers
/// never talk to the store or providers directly.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub jobs: JobManager,
}
