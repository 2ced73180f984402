//! Client event types: transient notices and forced navigation

use serde::{Deserialize, Serialize};

/// Severity of a transient notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A short user-facing message (the toast of a browser UI)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// Front-end routes known to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Root,
    Login,
    Register,
    Home,
}

impl Route {
    /// Routes that may only be entered with a stored credential
    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Home)
    }

    /// Path segment as exposed by the front-end
    pub fn path(self) -> &'static str {
        match self {
            Self::Root => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Home => "/home",
        }
    }

    /// Resolve where a navigation to `self` actually lands.
    ///
    /// The root always redirects to the login screen; protected routes fall
    /// back to login when no credential is held.
    pub fn resolve(self, authenticated: bool) -> Route {
        match self {
            Self::Root => Self::Login,
            route if route.requires_auth() && !authenticated => Self::Login,
            route => route,
        }
    }
}

/// Event published by the session layer for whoever renders the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Notice(Notice),
    Navigate { route: Route },
}

/// Sink for client events.
///
/// Injected as `Arc<dyn EventEmitter>` so tests can observe side effects.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: ClientEvent);

    fn notify(&self, notice: Notice) {
        self.emit(ClientEvent::Notice(notice));
    }

    fn navigate(&self, route: Route) {
        self.emit(ClientEvent::Navigate { route });
    }
}
