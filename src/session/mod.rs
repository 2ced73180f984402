//! Client session: credential, cached profile and remembered login
//!
//! The session is an explicit `SessionContext` injected wherever it is
//! needed; persistence goes through a `SessionStore`.

mod context;
mod models;
mod store;

pub use context::SessionContext;
pub use models::{SessionState, UserInfo};
pub use store::{FileSessionStore, MemorySessionStore, SessionError, SessionStore};
