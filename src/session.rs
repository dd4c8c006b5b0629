//! Per-session state and the in-memory session store
//!
//! Each connected client owns one `Session`. Nothing is written to disk;
//! a session's state vanishes when it is removed from the store, either
//! explicitly or once it has sat idle past the configured TTL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::assistant::RunOutput;
use crate::error::{AgentError, AgentResult};

/// Code buffer of a fresh session
pub const SAMPLE_CODE: &str = "/* Sample CSS */\n.container {\n  display: flex;\n  justify-content: center;\n  align-items: center;\n  height: 100vh;\n  background: linear-gradient(135deg, #6366f1 0%, #a855f7 100%);\n  color: white;\n  font-family: system-ui;\n}";

pub const DEFAULT_LANGUAGE: &str = "auto";
pub const DEFAULT_FOCUS_AREAS: [&str; 2] = ["Bugs", "Security"];

/// Max history entries kept per session
pub const HISTORY_LIMIT: usize = 50;
/// Characters of code shown in a history preview
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Editor,
    Review,
    Rewrite,
    Output,
    History,
}

impl View {
    pub const ALL: [View; 5] = [View::Editor, View::Review, View::Rewrite, View::Output, View::History];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Editor => "editor",
            View::Review => "review",
            View::Rewrite => "rewrite",
            View::Output => "output",
            View::History => "history",
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ChatRole::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, text: text.into() }
    }
}

/// Result stored with a history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "lowercase")]
pub enum HistoryResult {
    Review(String),
    Rewrite(String),
    Run(RunOutput),
}

impl HistoryResult {
    /// View that displays this result
    pub fn view(&self) -> View {
        match self {
            HistoryResult::Review(_) => View::Review,
            HistoryResult::Rewrite(_) => View::Rewrite,
            HistoryResult::Run(_) => View::Output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub language: String,
    pub code_preview: String,
    pub summary: String,
    pub full_code: String,
    #[serde(flatten)]
    pub result: HistoryResult,
}

impl HistoryEntry {
    pub fn new(code: &str, language: &str, summary: String, result: HistoryResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            language: language.to_string(),
            code_preview: preview(code),
            summary,
            full_code: code.to_string(),
            result,
        }
    }
}

fn preview(code: &str) -> String {
    let mut chars = code.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// One client's interaction state
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user: Option<User>,
    pub code: String,
    pub language: String,
    pub focus_areas: Vec<String>,
    pub messages: Vec<ChatMessage>,
    pub active_view: View,
    pub last_review: Option<String>,
    pub last_rewrite: Option<String>,
    pub last_run: Option<RunOutput>,
    pub history: Vec<HistoryEntry>,
    #[serde(skip)]
    last_active: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            user: None,
            code: SAMPLE_CODE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            focus_areas: DEFAULT_FOCUS_AREAS.iter().map(|s| s.to_string()).collect(),
            messages: Vec::new(),
            active_view: View::Editor,
            last_review: None,
            last_rewrite: None,
            last_run: None,
            history: Vec::new(),
            last_active: Instant::now(),
        }
    }

    /// Mark the session as used by its client
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    /// Newest first, oldest dropped past the limit
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.insert(0, entry);
        self.history.truncate(HISTORY_LIMIT);
    }

    pub fn find_history(&self, id: Uuid) -> Option<&HistoryEntry> {
        self.history.iter().find(|e| e.id == id)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// All live sessions, each behind its own lock
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> (Uuid, SessionHandle) {
        let session = Session::new();
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        tracing::info!(session = %id, "session created");
        (id, handle)
    }

    pub async fn get(&self, id: Uuid) -> AgentResult<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound(format!("session {}", id)))
    }

    pub async fn remove(&self, id: Uuid) -> AgentResult<()> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                tracing::info!(session = %id, "session closed");
                Ok(())
            }
            None => Err(AgentError::NotFound(format!("session {}", id))),
        }
    }

    /// Drop sessions idle for at least `ttl`. A locked session is in use
    /// and always kept. Returns how many were dropped.
    pub async fn reap_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| match handle.try_lock() {
            Ok(session) if session.idle_for() >= ttl => {
                tracing::info!(session = %id, idle_secs = session.idle_for().as_secs(), "session expired");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
