//! View controller: applies user actions to a session and renders views
//!
//! Remote calls happen before any session field is written, so a failed
//! call leaves the session exactly as it was.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assistant::{Assistant, RunOutput};
use crate::error::{AgentError, AgentResult};
use crate::rewrite::{unified_diff, RewriteSummary};
use crate::session::{ChatMessage, HistoryEntry, HistoryResult, Session, User, View};

const SIGNED_IN_NAME: &str = "John Developer";
const SIGNED_IN_ROLE: &str = "Senior Engineer";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SignIn { email: String, password: String },
    SignOut,
    SelectView { view: View },
    EditCode { code: String },
    Configure {
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        focus_areas: Option<Vec<String>>,
    },
    Run,
    Rewrite,
    Analyze,
    Chat { message: String },
    OpenHistory { id: Uuid },
    ClearHistory,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::SignIn { .. } => "sign_in",
            Action::SignOut => "sign_out",
            Action::SelectView { .. } => "select_view",
            Action::EditCode { .. } => "edit_code",
            Action::Configure { .. } => "configure",
            Action::Run => "run",
            Action::Rewrite => "rewrite",
            Action::Analyze => "analyze",
            Action::Chat { .. } => "chat",
            Action::OpenHistory { .. } => "open_history",
            Action::ClearHistory => "clear_history",
        }
    }
}

#[derive(Clone)]
pub struct Controller {
    assistant: Assistant,
}

impl Controller {
    pub fn new(assistant: Assistant) -> Self {
        Self { assistant }
    }

    pub fn assistant(&self) -> &Assistant {
        &self.assistant
    }

    pub async fn dispatch(&self, session: &mut Session, action: Action) -> AgentResult<()> {
        tracing::debug!(session = %session.id, action = action.name(), "dispatch");

        if !session.is_signed_in() && !matches!(action, Action::SignIn { .. }) {
            return Err(AgentError::Unauthenticated);
        }

        match action {
            Action::SignIn { email, password } => sign_in(session, &email, &password)?,
            Action::SignOut => {
                session.user = None;
                tracing::info!(session = %session.id, "signed out");
            }
            Action::SelectView { view } => session.active_view = view,
            Action::EditCode { code } => session.code = code,
            Action::Configure { language, focus_areas } => configure(session, language, focus_areas)?,
            Action::Run => self.run(session).await?,
            Action::Rewrite => self.rewrite(session).await?,
            Action::Analyze => self.analyze(session).await?,
            Action::Chat { message } => self.chat(session, message).await?,
            Action::OpenHistory { id } => open_history(session, id)?,
            Action::ClearHistory => session.history.clear(),
        }
        Ok(())
    }

    async fn run(&self, session: &mut Session) -> AgentResult<()> {
        let output = self.assistant.simulate_run(&session.code, &session.language).await?;
        let entry = HistoryEntry::new(
            &session.code,
            &session.language,
            truncate(&output.stdout, 50),
            HistoryResult::Run(output.clone()),
        );
        session.push_history(entry);
        session.last_run = Some(output);
        session.active_view = View::Output;
        Ok(())
    }

    async fn rewrite(&self, session: &mut Session) -> AgentResult<()> {
        let text = self.assistant.rewrite(&session.code, &session.language).await?;
        let summary = RewriteSummary::parse(&text).summary;
        let entry = HistoryEntry::new(
            &session.code,
            &session.language,
            truncate(&summary, 50),
            HistoryResult::Rewrite(text.clone()),
        );
        session.push_history(entry);
        session.last_rewrite = Some(text);
        session.active_view = View::Rewrite;
        Ok(())
    }

    async fn analyze(&self, session: &mut Session) -> AgentResult<()> {
        let text = self
            .assistant
            .review(&session.code, &session.language, &session.focus_areas)
            .await?;
        let entry = HistoryEntry::new(
            &session.code,
            &session.language,
            format!("Analyzed {}", session.focus_areas.join(", ")),
            HistoryResult::Review(text.clone()),
        );
        session.push_history(entry);
        session.last_review = Some(text);
        session.active_view = View::Review;
        Ok(())
    }

    /// Both messages are appended only once the reply has arrived
    async fn chat(&self, session: &mut Session, message: String) -> AgentResult<()> {
        if message.trim().is_empty() {
            return Err(AgentError::BadRequest("message is empty".into()));
        }
        let reply = self
            .assistant
            .chat(&session.messages, &session.code, &message)
            .await?;
        session.messages.push(ChatMessage::user(message));
        session.messages.push(ChatMessage::assistant(reply));
        Ok(())
    }
}

fn sign_in(session: &mut Session, email: &str, password: &str) -> AgentResult<()> {
    if email.is_empty() || password.is_empty() {
        return Err(AgentError::InvalidCredentials);
    }
    session.user = Some(User {
        name: SIGNED_IN_NAME.to_string(),
        email: email.to_string(),
        role: SIGNED_IN_ROLE.to_string(),
    });
    tracing::info!(session = %session.id, "signed in");
    Ok(())
}

fn configure(session: &mut Session, language: Option<String>, focus_areas: Option<Vec<String>>) -> AgentResult<()> {
    let language = match language.map(|l| l.trim().to_string()) {
        Some(l) if l.is_empty() => return Err(AgentError::BadRequest("language is empty".into())),
        other => other,
    };
    let focus_areas = match focus_areas {
        Some(areas) => {
            let areas: Vec<String> = areas
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
            if areas.is_empty() {
                return Err(AgentError::BadRequest("at least one focus area is required".into()));
            }
            Some(areas)
        }
        None => None,
    };

    // Validated both before touching the session
    if let Some(language) = language {
        session.language = language;
    }
    if let Some(areas) = focus_areas {
        session.focus_areas = areas;
    }
    Ok(())
}

fn open_history(session: &mut Session, id: Uuid) -> AgentResult<()> {
    let entry = session
        .find_history(id)
        .cloned()
        .ok_or_else(|| AgentError::NotFound(format!("history entry {}", id)))?;

    session.code = entry.full_code;
    session.language = entry.language;
    session.active_view = entry.result.view();
    match entry.result {
        HistoryResult::Review(text) => session.last_review = Some(text),
        HistoryResult::Rewrite(text) => session.last_rewrite = Some(text),
        HistoryResult::Run(output) => session.last_run = Some(output),
    }
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

// ═══════════════════════════════════════════════════════════════
// VIEW MODELS
// ═══════════════════════════════════════════════════════════════

/// What the client draws for the current state
#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    pub credential_configured: bool,
    #[serde(flatten)]
    pub screen: Screen,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<Vec<ChatMessage>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Screen {
    SignIn,
    Editor {
        code: String,
        language: String,
        focus_areas: Vec<String>,
    },
    Review {
        review: Option<String>,
        hint: Option<&'static str>,
    },
    Rewrite {
        rewrite: Option<String>,
        parsed: Option<RewriteSummary>,
        diff: Option<String>,
        hint: Option<&'static str>,
    },
    Output {
        output: Option<RunOutput>,
        hint: Option<&'static str>,
    },
    History {
        entries: Vec<HistoryEntry>,
    },
}

pub fn render(session: &Session, credential_configured: bool) -> ViewModel {
    let Some(user) = &session.user else {
        return ViewModel {
            session_id: session.id,
            user: None,
            credential_configured,
            screen: Screen::SignIn,
            chat: None,
        };
    };

    let screen = match session.active_view {
        View::Editor => Screen::Editor {
            code: session.code.clone(),
            language: session.language.clone(),
            focus_areas: session.focus_areas.clone(),
        },
        View::Review => Screen::Review {
            review: session.last_review.clone(),
            hint: session.last_review.is_none().then_some("Analyze code in the Editor first."),
        },
        View::Rewrite => match &session.last_rewrite {
            Some(text) => {
                let parsed = RewriteSummary::parse(text);
                let diff = unified_diff(&session.code, &parsed.code);
                Screen::Rewrite {
                    rewrite: Some(text.clone()),
                    parsed: Some(parsed),
                    diff: Some(diff),
                    hint: None,
                }
            }
            None => Screen::Rewrite {
                rewrite: None,
                parsed: None,
                diff: None,
                hint: Some("Rewrite code in the Editor first."),
            },
        },
        View::Output => Screen::Output {
            output: session.last_run.clone(),
            hint: session.last_run.is_none().then_some("Run code in the Editor first."),
        },
        View::History => Screen::History {
            entries: session.history.clone(),
        },
    };

    ViewModel {
        session_id: session.id,
        user: Some(user.clone()),
        credential_configured,
        screen,
        chat: Some(session.messages.clone()),
    }
}
