//! Durable storage for the session state

use super::SessionState;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Errors raised while persisting the session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session state could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key-value style persistence for the session, durable across restarts.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the persisted state. A missing or unreadable document yields the
    /// default (logged-out) state.
    async fn load(&self) -> Result<SessionState, SessionError>;

    /// Replace the persisted state.
    async fn save(&self, state: &SessionState) -> Result<(), SessionError>;
}

/// JSON document on disk (`session.json`)
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<SessionState, SessionError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No session file, starting logged out");
                return Ok(SessionState::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&contents) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Session file is corrupt, starting logged out"
                );
                Ok(SessionState::default())
            }
        }
    }

    async fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        // Write-then-rename so a crash never leaves a truncated document
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<SessionState>,
}

impl MemorySessionStore {
    pub fn new(state: SessionState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<SessionState, SessionError> {
        Ok(self.state.lock().await.clone())
    }

    async fn save(&self, state: &SessionState) -> Result<(), SessionError> {
        *self.state.lock().await = state.clone();
        Ok(())
    }
}
