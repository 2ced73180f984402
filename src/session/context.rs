//! Explicit session context shared by the request layer and the front-end

use super::{SessionError, SessionState, SessionStore, UserInfo};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Owner of the session state.
///
/// Every mutation goes through a single write lock and is persisted before
/// the lock is released, so concurrent observers never see a half-cleared
/// session.
pub struct SessionContext {
    state: RwLock<SessionState>,
    store: Arc<dyn SessionStore>,
}

impl SessionContext {
    /// Initialize from whatever the store holds
    pub async fn load(store: Arc<dyn SessionStore>) -> Result<Self, SessionError> {
        let state = store.load().await?;
        if state.has_credential() {
            info!("Restored persisted session");
        }
        Ok(Self::with_state(store, state))
    }

    /// Initialize with an explicit state (not persisted until the next mutation)
    pub fn with_state(store: Arc<dyn SessionStore>, state: SessionState) -> Self {
        Self {
            state: RwLock::new(state),
            store,
        }
    }

    /// The stored credential, if any
    pub async fn credential(&self) -> Option<String> {
        self.state.read().await.credential().map(str::to_string)
    }

    /// Copy of the full state
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn current_user(&self) -> Option<UserInfo> {
        self.state.read().await.current_user().cloned()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.read().await.current_user().is_some()
    }

    /// Apply a mutation and persist it
    pub async fn update<F>(&self, mutate: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut state = self.state.write().await;
        mutate(&mut state);
        self.store.save(&state).await
    }

    /// Clear the credential and cached profile.
    ///
    /// Returns `true` only for the call that actually removed a credential;
    /// later or concurrent calls observe an already-cleared state and return
    /// `false`. Persistence failures are logged, never propagated.
    pub async fn teardown(&self) -> bool {
        let mut state = self.state.write().await;
        if !state.clear_session() {
            return false;
        }
        if let Err(e) = self.store.save(&state).await {
            warn!(error = %e, "Failed to persist cleared session");
        }
        true
    }
}
