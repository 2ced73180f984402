//! AI chat over Server-Sent Events
//!
//! The decoder is transport-agnostic; `ChatStreamer` feeds it from a
//! `reqwest` body stream.

pub mod decoder;
pub mod stream;
pub mod types;

pub use decoder::{Framing, SseDecoder};
pub use stream::{pump, ChatStreamer, StreamHandle, StreamSink};
pub use types::{message_text, ChatRequest, StreamError, StreamEvent, StreamState};
