//! Error taxonomy shared by the controller and the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("sign in required")]
    Unauthenticated,
    #[error("email and password are required")]
    InvalidCredentials,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("remote completion failed: {0}")]
    Remote(String),
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;

impl AgentError {
    pub fn status(&self) -> StatusCode {
        match self {
            AgentError::NotFound(_) => StatusCode::NOT_FOUND,
            AgentError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AgentError::InvalidCredentials | AgentError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AgentError::Remote(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        } else {
            tracing::debug!(%status, error = %self, "request rejected");
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AgentError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AgentError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AgentError::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AgentError::Remote("timeout".into()).status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_remote_message() {
        let e = AgentError::Remote("API error 500".into());
        assert_eq!(e.to_string(), "remote completion failed: API error 500");
    }
}
