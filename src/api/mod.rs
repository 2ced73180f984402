//! Backend API client
//!
//! [`SessionGuard`] is the single gate every request passes through; the
//! typed wrappers (`UserApi`, `NoteApi`, `AuthService`) sit on top of it.

pub mod auth;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod notes;
pub mod revalidate;
pub mod users;

pub use auth::{AuthService, RememberedLogin};
pub use envelope::{classify, Classification, Envelope, ResponseShape};
pub use error::ApiError;
pub use guard::{parse_payload, Feedback, SessionGuard, NO_QUERY};
pub use notes::{notes_in_listing, Note, NoteApi, NoteDraft, Page};
pub use revalidate::{Revalidation, Revalidator};
pub use users::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, UserApi};
