//! Chat Completions client for OpenAI-compatible APIs (Groq by default)
//!
//! Non-streaming: each call blocks the acting session until the model
//! replies or the retry budget is spent.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Role of a message sent to the completions API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One completion call. Built per operation, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub json_mode: bool,
}

/// The remote capability: messages in, generated text out
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 120;
/// Max attempts for transient errors
const MAX_RETRIES: u32 = 3;
/// Base delay for exponential backoff (ms)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// reqwest-backed completions client
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Single attempt at a completion request
    async fn attempt(&self, body: &ChatRequest<'_>) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError {
                retryable: e.is_timeout() || e.is_connect(),
                error: anyhow::Error::new(e).context("Failed to reach completions API"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError {
                retryable: is_retryable_status(status.as_u16()),
                error: anyhow::anyhow!("API error {}: {}", status, api_error_message(&body)),
            });
        }

        let data: ChatResponse = response.json().await.map_err(|e| AttemptError {
            retryable: false,
            error: anyhow::Error::new(e).context("Failed to parse completion response"),
        })?;

        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AttemptError {
                retryable: false,
                error: anyhow::anyhow!("Completion response had no content"),
            })
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = ChatRequest::from(&request);
        let started = Instant::now();
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 500ms, 1s
                let delay = RETRY_BASE_DELAY_MS * (1 << (attempt - 1));
                tracing::warn!(model = %request.model, attempt, delay_ms = delay, "retrying completion");
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.attempt(&body).await {
                Ok(text) => {
                    tracing::info!(
                        model = %request.model,
                        json_mode = request.json_mode,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        chars = text.len(),
                        "completion finished"
                    );
                    return Ok(text);
                }
                Err(e) if e.retryable => {
                    tracing::debug!(model = %request.model, error = %e.error, "transient completion failure");
                    last_error = Some(e.error);
                }
                Err(e) => {
                    tracing::warn!(model = %request.model, error = %e.error, "completion failed");
                    return Err(e.error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries exceeded")))
    }
}

/// Check connectivity to the completions API
pub async fn check_connectivity(base_url: &str, api_key: Option<&str>) -> Result<()> {
    let client = reqwest::Client::new();
    let mut req = client
        .get(format!("{}/models", base_url.trim_end_matches('/')))
        .timeout(Duration::from_secs(5));
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }
    req.send().await.context("Failed to connect to completions API")?;
    Ok(())
}

struct AttemptError {
    retryable: bool,
    error: anyhow::Error,
}

/// Auth failures and rate limits are not retried; server errors are
fn is_retryable_status(status: u16) -> bool {
    match status {
        401 | 403 | 429 => false,
        s => s >= 500,
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw body
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_string())
}

// ═══════════════════════════════════════════════════════════════
// API Types
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

impl<'a> From<&'a CompletionRequest> for ChatRequest<'a> {
    fn from(req: &'a CompletionRequest) -> Self {
        Self {
            model: &req.model,
            messages: &req.messages,
            temperature: req.temperature,
            response_format: req.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}
