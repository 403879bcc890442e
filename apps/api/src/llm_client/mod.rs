/// LLM Client — the single point of entry for chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may talk to a provider endpoint
/// directly. All LLM interactions MUST go through this module.
///
/// Both providers (the cloud endpoint and the local Ollama-style endpoint)
/// speak the OpenAI-compatible `/chat/completions` protocol, so a single
/// client type covers them; the scoring layer decides which instance to use.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Per-call deadline. This is the only timeout in the system; it bounds
/// how long a job can sit in `processing` on a stuck provider.
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("provider returned an empty completion")]
    EmptyCompletion,

    #[error("secondary provider not configured")]
    NotConfigured,
}

/// A chat-completion backend. Implemented by `ChatClient` for real
/// endpoints and by scripted fakes in tests.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Sends one user message and returns the trimmed completion text.
    /// An empty completion is an error, never an empty string.
    async fn complete(
        &self,
        model: &str,
        temperature: f32,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// OpenAI-compatible chat-completions client over `reqwest`.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn complete(
        &self,
        model: &str,
        temperature: f32,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let request_body = ChatRequest {
            model,
            temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", "http://localhost:3000")
            .header("X-Title", "AI CV Evaluator")
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Try to parse the provider's error envelope
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatResponse = response.json().await?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ProviderError::EmptyCompletion)?;

        debug!(
            "chat completion succeeded: model={}, {} chars",
            model,
            text.len()
        );

        Ok(text)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
