mod config;
mod errors;
mod evaluation;
mod extract;
mod llm_client;
mod routes;
mod state;
mod upload;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::evaluation::jobs::{InMemoryJobStore, JobManager};
use crate::evaluation::pipeline::{PipelineContext, ReferenceDocs};
use crate::evaluation::results::FsResultStore;
use crate::evaluation::scoring::EvaluationLlm;
use crate::extract::DocumentExtractor;
use crate::llm_client::{ChatClient, ChatProvider};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_BIN_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV Evaluator API v{}", env!("CARGO_PKG_VERSION"));

    // Working directories for uploads and results
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tokio::fs::create_dir_all(&config.results_dir).await?;

    // Primary (cloud) provider
    let primary = ChatClient::new(&config.openai_base_url, &config.openai_api_key);
    info!(
        "primary provider: {} (model {})",
        config.openai_base_url, config.llm_model
    );

    // Secondary (local) provider — optional; its absence disables fallback.
    // The endpoint expects a bearer token but ignores its value.
    let secondary = config.ollama_base_url.as_ref().map(|url| {
        info!("fallback provider: {} (model {})", url, config.ollama_model);
        Arc::new(ChatClient::new(url, "ollama")) as Arc<dyn ChatProvider>
    });
    if secondary.is_none() {
        info!("OLLAMA_BASE_URL not set, provider fallback disabled");
    }

    let llm = EvaluationLlm::new(
        Arc::new(primary),
        config.llm_model.clone(),
        secondary,
        config.ollama_model.clone(),
    );

    // Wire the pipeline: in-memory job store, PDF extractor, filesystem
    // result mirror, and the three fixed reference documents.
    let ctx = PipelineContext {
        store: Arc::new(InMemoryJobStore::new()),
        extractor: Arc::new(DocumentExtractor),
        llm,
        results: Arc::new(FsResultStore::new(config.results_dir.clone())),
        references: ReferenceDocs::in_dir(&config.reference_dir),
    };
    let jobs = JobManager::new(ctx, Duration::from_millis(config.job_start_delay_ms));

    // Build app state
    let state = AppState {
        config: config.clone(),
        jobs,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
