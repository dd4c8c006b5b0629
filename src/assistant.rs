//! The four remote operations: review, rewrite, simulated run, chat
//!
//! Without a credential the assistant has no backend and every operation
//! returns a placeholder instead of calling out.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::{CompletionBackend, HttpBackend, Message};
use crate::config::Config;
use crate::error::{AgentError, AgentResult};
use crate::prompts;
use crate::session::{ChatMessage, ChatRole};

/// Placeholder text returned when no API key is configured
pub const MISSING_KEY_PLACEHOLDER: &str = "API Key missing.";

/// stderr marker for a run response that was not valid JSON
pub const PARSE_ERROR_MARKER: &str = "Parsing error.";

/// Simulated program output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl RunOutput {
    fn missing_key() -> Self {
        Self {
            stdout: String::new(),
            stderr: MISSING_KEY_PLACEHOLDER.to_string(),
        }
    }
}

/// Outcome of decoding a run response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunParse {
    Parsed(RunOutput),
    Malformed { raw: String, reason: String },
}

impl RunParse {
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<RunOutput>(raw) {
            Ok(out) => RunParse::Parsed(out),
            Err(e) => RunParse::Malformed {
                raw: raw.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Malformed responses degrade to the raw text on stdout
    pub fn into_output(self) -> RunOutput {
        match self {
            RunParse::Parsed(out) => out,
            RunParse::Malformed { raw, .. } => RunOutput {
                stdout: raw,
                stderr: PARSE_ERROR_MARKER.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Models {
    /// Review, rewrite
    pub primary: String,
    /// Simulated run, chat
    pub fast: String,
}

impl Default for Models {
    fn default() -> Self {
        Self {
            primary: crate::config::DEFAULT_MODEL.to_string(),
            fast: crate::config::DEFAULT_FAST_MODEL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Assistant {
    backend: Option<Arc<dyn CompletionBackend>>,
    models: Models,
    chat_window: usize,
}

impl Assistant {
    pub fn new(backend: Option<Arc<dyn CompletionBackend>>, models: Models, chat_window: usize) -> Self {
        Self { backend, models, chat_window }
    }

    /// Assistant with no credential: placeholder responses only
    pub fn offline() -> Self {
        Self::new(None, Models::default(), crate::config::DEFAULT_CHAT_WINDOW)
    }

    /// Build from config, using the HTTP backend when a key is present
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let backend: Option<Arc<dyn CompletionBackend>> = match cfg.credential() {
            Some(key) => Some(Arc::new(HttpBackend::new(&cfg.base_url, key)?)),
            None => {
                tracing::warn!("no API key configured, assistant returns placeholders");
                None
            }
        };
        let models = Models {
            primary: cfg.model.clone(),
            fast: cfg.fast_model.clone(),
        };
        Ok(Self::new(backend, models, cfg.chat_window))
    }

    pub fn has_credential(&self) -> bool {
        self.backend.is_some()
    }

    pub fn models(&self) -> &Models {
        &self.models
    }

    pub async fn review(&self, code: &str, language: &str, focus_areas: &[String]) -> AgentResult<String> {
        let Some(backend) = &self.backend else {
            return Ok(MISSING_KEY_PLACEHOLDER.to_string());
        };
        let req = prompts::review_request(&self.models.primary, code, language, focus_areas);
        backend.complete(req).await.map_err(remote)
    }

    pub async fn rewrite(&self, code: &str, language: &str) -> AgentResult<String> {
        let Some(backend) = &self.backend else {
            return Ok(MISSING_KEY_PLACEHOLDER.to_string());
        };
        let req = prompts::rewrite_request(&self.models.primary, code, language);
        backend.complete(req).await.map_err(remote)
    }

    pub async fn simulate_run(&self, code: &str, language: &str) -> AgentResult<RunOutput> {
        let Some(backend) = &self.backend else {
            return Ok(RunOutput::missing_key());
        };
        let req = prompts::run_request(&self.models.fast, code, language);
        let raw = backend.complete(req).await.map_err(remote)?;

        let parsed = RunParse::parse(&raw);
        if let RunParse::Malformed { reason, .. } = &parsed {
            tracing::warn!(%reason, "run response was not valid JSON, degrading to raw text");
        }
        Ok(parsed.into_output())
    }

    /// Only the last `chat_window` transcript entries are forwarded
    pub async fn chat(&self, transcript: &[ChatMessage], code: &str, new_message: &str) -> AgentResult<String> {
        let Some(backend) = &self.backend else {
            return Ok(MISSING_KEY_PLACEHOLDER.to_string());
        };
        let start = transcript.len().saturating_sub(self.chat_window);
        if start > 0 {
            tracing::debug!(dropped = start, "chat transcript windowed");
        }
        let history = transcript[start..].iter().map(to_api_message).collect();
        let req = prompts::chat_request(&self.models.fast, code, history, new_message);
        backend.complete(req).await.map_err(remote)
    }
}

fn to_api_message(msg: &ChatMessage) -> Message {
    match msg.role {
        ChatRole::User => Message::user(msg.text.clone()),
        ChatRole::Assistant => Message::assistant(msg.text.clone()),
    }
}

fn remote(e: anyhow::Error) -> AgentError {
    AgentError::Remote(format!("{:#}", e))
}
