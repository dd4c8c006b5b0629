//! HTTP API over the view controller
//!
//! One session per client: `POST /api/sessions` hands out an id, every other
//! route acts on that session and answers with the rendered view model.

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::controller::{render, Action, Controller, ViewModel};
use crate::error::AgentResult;
use crate::session::{SessionStore, View};

/// Application state shared by all handlers
pub struct AppState {
    pub sessions: SessionStore,
    pub controller: Controller,
}

impl AppState {
    pub fn new(controller: Controller) -> Self {
        Self {
            sessions: SessionStore::new(),
            controller,
        }
    }

    /// Lock the session, apply the action, render the result
    async fn act(&self, id: Uuid, action: Action) -> AgentResult<Json<ViewModel>> {
        let handle = self.sessions.get(id).await?;
        let mut session = handle.lock().await;
        session.touch();
        self.controller.dispatch(&mut session, action).await?;
        Ok(Json(render(&session, self.controller.assistant().has_credential())))
    }
}

type SharedState = Arc<AppState>;

// ═══════════════════════════════════════════════════════════════
// API TYPES
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub view: View,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub focus_areas: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

// ═══════════════════════════════════════════════════════════════
// HANDLERS
// ═══════════════════════════════════════════════════════════════

async fn health() -> &'static str {
    "ok"
}

async fn create_session(State(state): State<SharedState>) -> (StatusCode, Json<ViewModel>) {
    let (_, handle) = state.sessions.create().await;
    let session = handle.lock().await;
    (
        StatusCode::CREATED,
        Json(render(&session, state.controller.assistant().has_credential())),
    )
}

async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> AgentResult<Json<ViewModel>> {
    let handle = state.sessions.get(id).await?;
    let mut session = handle.lock().await;
    session.touch();
    Ok(Json(render(&session, state.controller.assistant().has_credential())))
}

async fn close_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> AgentResult<StatusCode> {
    state.sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn login(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<LoginRequest>,
) -> AgentResult<Json<ViewModel>> {
    state
        .act(id, Action::SignIn { email: req.email, password: req.password })
        .await
}

async fn logout(State(state): State<SharedState>, Path(id): Path<Uuid>) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::SignOut).await
}

async fn select_view(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ViewRequest>,
) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::SelectView { view: req.view }).await
}

async fn edit_code(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CodeRequest>,
) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::EditCode { code: req.code }).await
}

async fn settings(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SettingsRequest>,
) -> AgentResult<Json<ViewModel>> {
    state
        .act(id, Action::Configure { language: req.language, focus_areas: req.focus_areas })
        .await
}

async fn run(State(state): State<SharedState>, Path(id): Path<Uuid>) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::Run).await
}

async fn rewrite(State(state): State<SharedState>, Path(id): Path<Uuid>) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::Rewrite).await
}

async fn review(State(state): State<SharedState>, Path(id): Path<Uuid>) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::Analyze).await
}

async fn chat(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::Chat { message: req.message }).await
}

async fn open_history(
    State(state): State<SharedState>,
    Path((id, entry)): Path<(Uuid, Uuid)>,
) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::OpenHistory { id: entry }).await
}

async fn clear_history(State(state): State<SharedState>, Path(id): Path<Uuid>) -> AgentResult<Json<ViewModel>> {
    state.act(id, Action::ClearHistory).await
}

/// Generic entry point taking any tagged action
async fn action(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(action): Json<Action>,
) -> AgentResult<Json<ViewModel>> {
    state.act(id, action).await
}

// ═══════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(close_session))
        .route("/api/sessions/:id/login", post(login))
        .route("/api/sessions/:id/logout", post(logout))
        .route("/api/sessions/:id/view", put(select_view))
        .route("/api/sessions/:id/code", put(edit_code))
        .route("/api/sessions/:id/settings", put(settings))
        .route("/api/sessions/:id/run", post(run))
        .route("/api/sessions/:id/rewrite", post(rewrite))
        .route("/api/sessions/:id/review", post(review))
        .route("/api/sessions/:id/chat", post(chat))
        .route("/api/sessions/:id/actions", post(action))
        .route("/api/sessions/:id/history", delete(clear_history))
        .route("/api/sessions/:id/history/:entry", post(open_history))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Longest gap between idle-session sweeps
const MAX_REAP_INTERVAL: Duration = Duration::from_secs(60);
const MIN_REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Periodically drop sessions whose client has gone quiet for `ttl`
pub fn spawn_session_reaper(state: SharedState, ttl: Duration) -> JoinHandle<()> {
    let period = ttl.clamp(MIN_REAP_INTERVAL, MAX_REAP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let expired = state.sessions.reap_idle(ttl).await;
            if expired > 0 {
                let remaining = state.sessions.len().await;
                tracing::info!(expired, remaining, "idle sessions reaped");
            }
        }
    })
}

/// Bind and serve until Ctrl-C
pub async fn run_server(state: SharedState, port: u16, session_ttl: Option<Duration>) -> anyhow::Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, credential = state.controller.assistant().has_credential(), "codeagent listening");

    let reaper = session_ttl.map(|ttl| spawn_session_reaper(state.clone(), ttl));

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
