//! Typed failures surfaced by the request layer

use crate::session::SessionError;
use serde_json::Value;
use thiserror::Error;

/// Every request either yields its payload or one of these.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Well-formed backend reply reporting a failure (validation, not found…)
    #[error("{message}")]
    Business { message: String, envelope: Value },

    /// The credential is no longer valid; the session has been torn down
    #[error("authentication expired: {0}")]
    AuthExpired(String),

    /// Non-2xx HTTP status (other than 401)
    #[error("{message}")]
    Http { status: u16, message: String },

    /// No response at all (connection refused, timeout, DNS…)
    #[error("{0}")]
    Transport(String),

    /// A 2xx response whose body is not JSON
    #[error("invalid response body: {0}")]
    InvalidResponse(String),

    /// The operation needs a logged-in user
    #[error("not logged in")]
    NotLoggedIn,

    /// The request could not be built locally
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The session file could not be written
    #[error("failed to persist session: {0}")]
    Storage(String),
}

impl ApiError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { status: 500..=599, .. })
    }

    /// Whether the guard already showed a notice for this failure
    pub fn was_notified(&self) -> bool {
        matches!(
            self,
            Self::Business { .. } | Self::AuthExpired(_) | Self::Http { .. } | Self::Transport(_)
        )
    }

    /// Message suitable for a transient notice
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "Network error, check the server connection".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
