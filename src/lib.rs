//! codeagent - LLM-backed code review workspace
//!
//! Sessions hold a code buffer, chat log and the last review, rewrite and
//! simulated run. The controller applies user actions; the assistant turns
//! them into chat-completion calls.

pub mod assistant;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod prompts;
pub mod rewrite;
pub mod server;
pub mod session;

pub use assistant::{Assistant, Models, RunOutput, RunParse};
pub use client::{CompletionBackend, CompletionRequest, Message, Role};
pub use config::Config;
pub use controller::{render, Action, Controller, Screen, ViewModel};
pub use error::{AgentError, AgentResult};
pub use session::{ChatMessage, ChatRole, HistoryEntry, HistoryResult, Session, SessionStore, User, View};
