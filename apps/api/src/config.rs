use std::path::PathBuf;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the primary (cloud) provider. Required.
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub llm_model: String,
    /// Endpoint of the secondary (local) provider. `None` disables fallback.
    pub ollama_base_url: Option<String>,
    pub ollama_model: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Directory holding the three fixed reference documents
    /// (job description, case study brief, scoring rubric).
    pub reference_dir: PathBuf,
    /// Grace period between job submission and pipeline start, so a
    /// just-finished upload settles on disk before extraction reads it.
    pub job_start_delay_ms: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: require_env("OPENAI_API_KEY")?,
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            llm_model: env_or("LLM_MODEL", "mistralai/mixtral-8x7b-instruct"),
            ollama_base_url: std::env::var("OLLAMA_BASE_URL").ok(),
            ollama_model: env_or("OLLAMA_MODEL", "mistral"),
            port: env_or("PORT", "3000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            upload_dir: PathBuf::from(env_or("UPLOAD_DIR", "data/uploads")),
            results_dir: PathBuf::from(env_or("RESULTS_DIR", "data/results")),
            reference_dir: PathBuf::from(env_or("REFERENCE_DIR", "data/ground_truth")),
            job_start_delay_ms: env_or("JOB_START_DELAY_MS", "3000")
                .parse::<u64>()
                .context("JOB_START_DELAY_MS must be a number of milliseconds")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
