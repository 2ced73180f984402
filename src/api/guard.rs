//! Session-aware request layer
//!
//! All ordinary (non-streaming) backend calls go through [`SessionGuard`]:
//! it attaches the stored credential, classifies the reply once, and tears
//! the session down when the backend reports the credential as expired.

use super::envelope::{classify, message_field, Classification};
use super::ApiError;
use crate::events::{EventEmitter, Notice, Route};
use crate::session::SessionContext;
use crate::ClientConfig;
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Empty query string for routes without parameters
pub const NO_QUERY: &[(&str, &str)] = &[];

/// Notice shown when the session is torn down
const SESSION_EXPIRED_NOTICE: &str = "Session expired, please log in again";

/// Whether failures are surfaced as transient notices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feedback {
    #[default]
    Notify,
    /// Log only; used by background work such as revalidation
    Quiet,
}

/// HTTP client wrapper enforcing the session lifecycle
pub struct SessionGuard {
    http: Client,
    base_url: String,
    auth_expired_code: i64,
    session: Arc<SessionContext>,
    events: Arc<dyn EventEmitter>,
}

impl SessionGuard {
    pub fn new(
        config: &ClientConfig,
        session: Arc<SessionContext>,
        events: Arc<dyn EventEmitter>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_expired_code: config.auth_expired_code,
            session,
            events,
        })
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn events(&self) -> &Arc<dyn EventEmitter> {
        &self.events
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a request against an API path
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Attach the stored credential, if any, as the `Authorization` header.
    pub async fn decorate(&self, req: RequestBuilder) -> RequestBuilder {
        let credential = self.session.credential().await;
        attach_credential(req, credential.as_deref())
    }

    pub async fn get<Q>(&self, path: &str, query: &Q) -> Result<Value, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    pub async fn post<B>(&self, path: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn put<B>(&self, path: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.send(self.request(Method::PUT, path).json(body)).await
    }

    pub async fn delete<Q>(&self, path: &str, query: &Q) -> Result<Value, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        self.send(self.request(Method::DELETE, path).query(query))
            .await
    }

    pub async fn post_multipart(&self, path: &str, form: Form) -> Result<Value, ApiError> {
        self.send(self.request(Method::POST, path).multipart(form))
            .await
    }

    /// Decorate, execute and classify, surfacing failures as notices.
    pub async fn send(&self, req: RequestBuilder) -> Result<Value, ApiError> {
        self.execute(req, Feedback::Notify).await
    }

    /// Same as [`send`](Self::send) but without user-facing notices.
    pub async fn send_quiet(&self, req: RequestBuilder) -> Result<Value, ApiError> {
        self.execute(req, Feedback::Quiet).await
    }

    async fn execute(&self, req: RequestBuilder, feedback: Feedback) -> Result<Value, ApiError> {
        let credential = self.session.credential().await;
        let had_credential = credential.is_some();
        let req = attach_credential(req, credential.as_deref());

        let response = match req.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, url = ?e.url().map(|u| u.as_str()), "No response from server");
                return Err(self.fail(ApiError::Transport(e.to_string()), feedback));
            }
        };

        let status = response.status();
        let url = response.url().to_string();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                error!(error = %e, %url, "Failed to read response body");
                return Err(self.fail(ApiError::Transport(e.to_string()), feedback));
            }
        };

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(body) => body,
                Err(_) if !status.is_success() => Value::String(text),
                Err(e) => {
                    error!(error = %e, %url, status = status.as_u16(), "Response body is not JSON");
                    return Err(self.fail(ApiError::InvalidResponse(e.to_string()), feedback));
                }
            }
        };

        if status == StatusCode::UNAUTHORIZED {
            let message =
                message_field(&body).unwrap_or_else(|| "Authentication expired".to_string());
            return Err(self.auth_expired(message, had_credential, feedback).await);
        }

        if !status.is_success() {
            if let Classification::AuthExpired(message) =
                classify(body.clone(), self.auth_expired_code)
            {
                return Err(self.auth_expired(message, had_credential, feedback).await);
            }
            let message = message_field(&body)
                .unwrap_or_else(|| format!("Server error ({})", status.as_u16()));
            error!(
                %url,
                status = status.as_u16(),
                response = %body,
                %message,
                "HTTP error response"
            );
            return Err(self.fail(
                ApiError::Http {
                    status: status.as_u16(),
                    message,
                },
                feedback,
            ));
        }

        match classify(body, self.auth_expired_code) {
            Classification::Success(payload) => {
                debug!(%url, status = status.as_u16(), "Request succeeded");
                Ok(payload)
            }
            Classification::BusinessError { message, raw } => {
                error!(
                    %url,
                    code = ?raw.get("code"),
                    %message,
                    response = %raw,
                    "Business error response"
                );
                Err(self.fail(
                    ApiError::Business {
                        message,
                        envelope: raw,
                    },
                    feedback,
                ))
            }
            Classification::AuthExpired(message) => {
                Err(self.auth_expired(message, had_credential, feedback).await)
            }
        }
    }

    /// Tear the session down after an auth-expiry signal.
    ///
    /// Idempotent: only the call that actually clears a credential emits the
    /// notice and the redirect to the login screen. Returns whether this
    /// call performed the teardown.
    pub async fn on_auth_expired(&self, reason: &str) -> bool {
        if !self.session.teardown().await {
            debug!(%reason, "Auth expiry observed, session already cleared");
            return false;
        }
        warn!(%reason, "Authentication expired, session cleared");
        self.events.notify(Notice::error(SESSION_EXPIRED_NOTICE));
        self.events.navigate(Route::Login);
        true
    }

    async fn auth_expired(
        &self,
        message: String,
        had_credential: bool,
        feedback: Feedback,
    ) -> ApiError {
        let tore_down = self.on_auth_expired(&message).await;
        // A request sent without any credential (e.g. a failed login) still
        // deserves a visible reason; one sent with a credential that someone
        // else already cleared stays silent.
        if !tore_down && !had_credential && feedback == Feedback::Notify {
            self.events.notify(Notice::error(message.clone()));
        }
        ApiError::AuthExpired(message)
    }

    fn fail(&self, err: ApiError, feedback: Feedback) -> ApiError {
        if feedback == Feedback::Notify {
            self.events.notify(Notice::error(err.user_message()));
        }
        err
    }
}

/// Decode a successful payload into a typed value
pub fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

fn attach_credential(req: RequestBuilder, credential: Option<&str>) -> RequestBuilder {
    match credential {
        Some(token) => req.header(reqwest::header::AUTHORIZATION, token),
        None => req,
    }
}
