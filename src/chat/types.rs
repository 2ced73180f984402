//! Chat stream types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Body POSTed to the chat endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: i64,
    pub prompt: String,
    /// Model override; the backend default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Lifecycle of one streaming request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Connecting,
    Streaming,
    Completed,
    Failed,
    /// Cancelled by the caller; no further callbacks were delivered
    Aborted,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

/// Why a stream ended in [`StreamState::Failed`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The endpoint answered with a non-2xx status before streaming
    #[error("chat endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection failure, before or during streaming
    #[error("chat stream transport error: {0}")]
    Transport(String),
}

/// Events forwarded by the channel sink
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Message(Value),
    Completed,
    Failed(StreamError),
}

/// Printable text of a decoded message: its `content` field, else the raw JSON
pub fn message_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Object(obj) => match obj.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => message.to_string(),
        },
        other => other.to_string(),
    }
}
