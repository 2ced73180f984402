//! Test helper factories and mock state builders
#![allow(dead_code)]

use crate::api::SessionGuard;
use crate::events::{ClientEvent, EventEmitter, Notice, Route};
use crate::session::{MemorySessionStore, SessionContext, SessionState, UserInfo};
use crate::ClientConfig;
use std::sync::{Arc, Mutex};

/// Emitter that records everything for later assertions
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<ClientEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ClientEvent::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn redirects(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    ClientEvent::Navigate {
                        route: Route::Login
                    }
                )
            })
            .count()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: ClientEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A logged-in session for user 42
pub fn logged_in_state() -> SessionState {
    SessionState {
        token: Some("tok-123".into()),
        user_info: Some(UserInfo {
            id: Some(42),
            username: Some("alice".into()),
            nickname: Some("Alice".into()),
            ..Default::default()
        }),
        nickname: Some("Alice".into()),
        avatar_url: None,
        remembered_username: Some("alice".into()),
        remembered_password: None,
    }
}

/// Config pointing at a test server
pub fn test_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        api_base_url: base_url.to_string(),
        chat_url: format!("{}/ai/chat", base_url.trim_end_matches('/')),
        ..ClientConfig::default()
    }
}

/// SessionGuard backed by an in-memory store and a recording emitter
pub async fn guard_for(
    base_url: &str,
    state: SessionState,
) -> (SessionGuard, Arc<RecordingEmitter>) {
    let emitter = Arc::new(RecordingEmitter::default());
    let session = Arc::new(SessionContext::with_state(
        Arc::new(MemorySessionStore::new(state.clone())),
        state,
    ));
    let guard = SessionGuard::new(&test_config(base_url), session, emitter.clone())
        .expect("guard init");
    (guard, emitter)
}
