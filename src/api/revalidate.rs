//! Background credential revalidation
//!
//! Every interval, if a credential is stored, the validation endpoint is
//! called. An explicit "invalid" answer tears the session down; no answer at
//! all (network loss) is ignored so a flaky connection never logs the user
//! out.

use super::guard::{SessionGuard, NO_QUERY};
use super::ApiError;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of a single revalidation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revalidation {
    /// No credential stored, nothing to check
    Skipped,
    Valid,
    /// Backend rejected the credential; the session was torn down
    Invalid,
    /// No response, or an error that says nothing about the credential
    Inconclusive,
}

/// Periodic credential checker
pub struct Revalidator {
    guard: Arc<SessionGuard>,
    validate_path: String,
    interval: Duration,
}

impl Revalidator {
    pub fn new(guard: Arc<SessionGuard>, validate_path: impl Into<String>, interval: Duration) -> Self {
        Self {
            guard,
            validate_path: validate_path.into(),
            interval,
        }
    }

    /// Run one validation pass
    pub async fn revalidate_once(&self) -> Revalidation {
        if self.guard.session().credential().await.is_none() {
            return Revalidation::Skipped;
        }

        let req = self.guard.request(Method::GET, &self.validate_path).query(NO_QUERY);
        match self.guard.send_quiet(req).await {
            Ok(payload) if payload_says_invalid(&payload) => {
                self.guard.on_auth_expired("credential rejected by validation endpoint").await;
                Revalidation::Invalid
            }
            Ok(_) => {
                debug!("Credential still valid");
                Revalidation::Valid
            }
            // The guard already tore the session down
            Err(ApiError::AuthExpired(_)) => Revalidation::Invalid,
            Err(ApiError::Transport(e)) => {
                debug!(error = %e, "Revalidation got no response, keeping session");
                Revalidation::Inconclusive
            }
            Err(e) => {
                warn!(error = %e, "Revalidation failed, keeping session");
                Revalidation::Inconclusive
            }
        }
    }

    /// Spawn the periodic loop; it runs until `shutdown` is cancelled.
    ///
    /// The first check happens one full interval after start.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() fires immediately; consume that tick
            ticker.tick().await;

            info!(interval_secs = self.interval.as_secs(), "Session revalidation started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.revalidate_once().await;
                    }
                }
            }
            debug!("Session revalidation stopped");
        })
    }
}

/// `false` or `{ "valid": false }` means the backend rejected the credential
fn payload_says_invalid(payload: &Value) -> bool {
    match payload {
        Value::Bool(valid) => !valid,
        Value::Object(obj) => obj.get("valid").and_then(Value::as_bool) == Some(false),
        _ => false,
    }
}
