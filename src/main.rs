//! codeagent - code review workspace server
//!
//! USAGE:
//!   codeagent serve [--port N]       # run the HTTP API
//!   codeagent doctor                 # check config, key, network
//!   codeagent config set <key> <v>   # non-interactive config

use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codeagent::{client, config, server, Assistant, Config, Controller};

// ═══════════════════════════════════════════════════════════════
// CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, PartialEq)]
enum Command {
    Serve { port: Option<u16> },
    Doctor,
    ConfigSet { key: String, value: String },
    Help,
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        return Ok(Command::Serve { port: None });
    };

    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Ok(Command::Help);
    }

    match first.as_str() {
        "serve" => {
            let mut port = None;
            let mut i = 1;
            while i < args.len() {
                match args[i].as_str() {
                    "--port" | "-p" => {
                        i += 1;
                        let value = args.get(i).map(String::as_str).unwrap_or_default();
                        port = Some(value.parse().map_err(|_| anyhow::anyhow!("Invalid port: {}", value))?);
                    }
                    other => anyhow::bail!("Unknown flag: {}", other),
                }
                i += 1;
            }
            Ok(Command::Serve { port })
        }
        "doctor" => Ok(Command::Doctor),
        "config" if args.get(1).map(String::as_str) == Some("set") => Ok(Command::ConfigSet {
            key: args.get(2).cloned().unwrap_or_default(),
            value: args.get(3).cloned().unwrap_or_default(),
        }),
        "help" => Ok(Command::Help),
        other => anyhow::bail!("Unknown command: {}. Run `codeagent --help`", other),
    }
}

fn print_help() {
    println!(r#"codeagent - LLM-backed code review workspace

USAGE:
    codeagent serve [--port N]       # run the HTTP API (default port 8501)
    codeagent doctor                 # check config, key, network
    codeagent config set <key> <v>   # set config value

CONFIG KEYS:
    key, model, fast-model, base-url, chat-window, port, session-ttl

CONFIG:
    ~/.config/codeagent/config.json  API key, models, port

ENVIRONMENT:
    GROQ_API_KEY                     API key (absent = placeholder replies)
    CODEAGENT_BASE_URL               OpenAI-compatible API root
    CODEAGENT_MODEL                  Model for review and rewrite
    CODEAGENT_FAST_MODEL             Model for run and chat
    PORT                             Listen port
    CODEAGENT_SESSION_TTL            Idle seconds before a session is dropped (0 = never)
    RUST_LOG                         Log filter (default codeagent=info)
"#);
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "codeagent=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// ═══════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args)? {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Doctor => run_doctor().await,
        Command::ConfigSet { key, value } => run_config_set(&key, &value),
        Command::Serve { port } => run_serve(port).await,
    }
}

// ═══════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════

async fn run_serve(port: Option<u16>) -> Result<()> {
    let cfg = Config::load()?.with_env();
    let port = port.unwrap_or(cfg.port);

    tracing::info!(
        model = %cfg.model,
        fast_model = %cfg.fast_model,
        chat_window = cfg.chat_window,
        session_ttl_secs = cfg.session_ttl_secs,
        "starting"
    );
    let assistant = Assistant::from_config(&cfg)?;
    let state = Arc::new(server::AppState::new(Controller::new(assistant)));
    server::run_server(state, port, cfg.session_ttl()).await
}

async fn run_doctor() -> Result<()> {
    println!("codeagent doctor\n");

    let path = config::config_path()?;
    let cfg = Config::load()?.with_env();
    println!("[{}] Config: {}", if path.exists() { "✓" } else { "-" }, path.display());

    let has_key = cfg.credential().is_some();
    println!(
        "[{}] API key: {}",
        if has_key { "✓" } else { "✗" },
        if has_key { "configured" } else { "missing (placeholder replies)" }
    );
    println!("[-] Models: {} / {}", cfg.model, cfg.fast_model);

    match client::check_connectivity(&cfg.base_url, cfg.credential()).await {
        Ok(()) => println!("[✓] Network: {} reachable", cfg.base_url),
        Err(e) => println!("[✗] Network: {:#}", e),
    }

    Ok(())
}

fn run_config_set(key: &str, value: &str) -> Result<()> {
    let mut cfg = Config::load()?;
    cfg.set(key, value)?;
    cfg.save()?;
    if key == "key" || key == "api_key" {
        println!("API key saved to {}", config::config_path()?.display());
    } else {
        println!("{} set to: {}", key, value);
    }
    Ok(())
}
