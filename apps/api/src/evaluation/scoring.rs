//! LLM scoring with primary→secondary fallback and response repair.
//!
//! One attempt per provider, in fixed order, no backoff. Provider outcomes
//! are matched explicitly so the fallback branch is visible control flow
//! rather than an exception path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::evaluation::prompts::{
    build_evaluation_prompt, build_normalization_prompt, PromptInputs,
};
use crate::llm_client::{ChatProvider, ProviderError};

const PRIMARY_TEMPERATURE: f32 = 0.4;
const FALLBACK_TEMPERATURE: f32 = 0.3;
/// Normalization is a mechanical reformat; temperature 0 keeps it deterministic.
const NORMALIZE_TEMPERATURE: f32 = 0.0;

/// The scoring schema the model is instructed to return. Responses parsing
/// into this struct are stored structured; anything else is wrapped raw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationScores {
    pub cv_match_rate: f64,
    pub cv_feedback: String,
    pub project_score: f64,
    pub project_feedback: String,
    pub overall_summary: String,
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("both cloud and local model calls failed: primary: {primary}; secondary: {secondary}")]
    AllProvidersFailed {
        primary: ProviderError,
        secondary: ProviderError,
    },
}

/// The scoring backend pair: a cloud primary and an optional local fallback.
pub struct EvaluationLlm {
    primary: Arc<dyn ChatProvider>,
    primary_model: String,
    secondary: Option<Arc<dyn ChatProvider>>,
    secondary_model: String,
}

impl EvaluationLlm {
    pub fn new(
        primary: Arc<dyn ChatProvider>,
        primary_model: String,
        secondary: Option<Arc<dyn ChatProvider>>,
        secondary_model: String,
    ) -> Self {
        Self {
            primary,
            primary_model,
            secondary,
            secondary_model,
        }
    }

    /// Runs one evaluation call. Primary first; on any primary failure the
    /// same prompt goes to the secondary provider. The winning response is
    /// normalized if it does not look like JSON.
    pub async fn score(&self, inputs: &PromptInputs) -> Result<String, ScoreError> {
        let prompt = build_evaluation_prompt(inputs);

        let primary_failure = match self
            .primary
            .complete(&self.primary_model, PRIMARY_TEMPERATURE, &prompt)
            .await
        {
            Ok(text) => return Ok(self.ensure_json_shaped(text).await),
            Err(e) => e,
        };

        warn!("primary provider failed ({primary_failure}), switching to local model");

        let secondary_failure = match &self.secondary {
            Some(provider) => {
                match provider
                    .complete(&self.secondary_model, FALLBACK_TEMPERATURE, &prompt)
                    .await
                {
                    Ok(text) => {
                        info!("local fallback succeeded with model {}", self.secondary_model);
                        return Ok(self.ensure_json_shaped(text).await);
                    }
                    Err(e) => e,
                }
            }
            None => ProviderError::NotConfigured,
        };

        Err(ScoreError::AllProvidersFailed {
            primary: primary_failure,
            secondary: secondary_failure,
        })
    }

    /// Coerces prose into the result schema with one corrective call on the
    /// primary provider only. Returns the input unchanged if that call fails;
    /// downstream parsing owns the final fallback.
    async fn ensure_json_shaped(&self, text: String) -> String {
        if text.trim_start().starts_with('{') {
            return text;
        }

        info!("response is prose, normalizing into JSON");

        match self
            .primary
            .complete(
                &self.primary_model,
                NORMALIZE_TEMPERATURE,
                &build_normalization_prompt(&text),
            )
            .await
        {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!("JSON normalization failed ({e}), returning raw text");
                text
            }
        }
    }
}
