//! Configuration management with XDG paths
//!
//! ~/.config/codeagent/config.json - API key, models, server port (0600)
//!
//! Environment variables override the file; a missing API key is a valid
//! state and puts the assistant into placeholder mode.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "codeagent";

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_FAST_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_PORT: u16 = 8501;
pub const DEFAULT_CHAT_WINDOW: usize = 20;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Get config directory (~/.config/codeagent/)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Completions API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible API root
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model for review, rewrite
    #[serde(default = "default_model")]
    pub model: String,

    /// Model for simulated runs and chat
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Prior chat messages forwarded with each chat call
    #[serde(default = "default_chat_window")]
    pub chat_window: usize,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds a session may sit unused before it is dropped (0 = never)
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn default_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_model() -> String { DEFAULT_MODEL.to_string() }
fn default_fast_model() -> String { DEFAULT_FAST_MODEL.to_string() }
fn default_chat_window() -> usize { DEFAULT_CHAT_WINDOW }
fn default_port() -> u16 { DEFAULT_PORT }
fn default_session_ttl_secs() -> u64 { DEFAULT_SESSION_TTL_SECS }

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            fast_model: default_fast_model(),
            chat_window: default_chat_window(),
            port: default_port(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl Config {
    /// Load config from the XDG path, or return defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load config from an explicit path, or return defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save config to the XDG path
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    /// Save config with secure permissions
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // Owner read/write only, the file may hold the API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Apply environment overrides from the process environment
    pub fn with_env(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a lookup function (environment in production)
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GROQ_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("CODEAGENT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = non_empty("CODEAGENT_MODEL") {
            self.model = model;
        }
        if let Some(model) = non_empty("CODEAGENT_FAST_MODEL") {
            self.fast_model = model;
        }
        if let Some(port) = non_empty("PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(ttl) = non_empty("CODEAGENT_SESSION_TTL").and_then(|t| t.parse().ok()) {
            self.session_ttl_secs = ttl;
        }
        self
    }

    /// The credential, treating an empty string as absent
    pub fn credential(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Idle expiry for sessions, `None` when disabled
    pub fn session_ttl(&self) -> Option<Duration> {
        (self.session_ttl_secs > 0).then(|| Duration::from_secs(self.session_ttl_secs))
    }

    /// Set a value by its CLI name
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "key" | "api_key" => self.api_key = Some(value.to_string()),
            "model" => self.model = value.to_string(),
            "fast-model" | "fast_model" => self.fast_model = value.to_string(),
            "base-url" | "base_url" => self.base_url = value.trim_end_matches('/').to_string(),
            "chat-window" | "chat_window" => {
                self.chat_window = value
                    .parse()
                    .with_context(|| format!("Invalid chat window: {}", value))?;
            }
            "port" => {
                self.port = value
                    .parse()
                    .with_context(|| format!("Invalid port: {}", value))?;
            }
            "session-ttl" | "session_ttl_secs" => {
                self.session_ttl_secs = value
                    .parse()
                    .with_context(|| format!("Invalid session TTL: {}", value))?;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Valid keys: key, model, fast-model, base-url, chat-window, port, session-ttl",
                key
            ),
        }
        Ok(())
    }
}
