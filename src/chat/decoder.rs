//! Incremental Server-Sent-Events decoder
//!
//! Bytes arrive in arbitrary chunks. The decoder keeps an incomplete UTF-8
//! tail between reads, splits the text buffer on frame boundaries and emits
//! one JSON value per frame carrying `data:` lines. Partial frames stay
//! buffered until the next read.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::debug;

/// Prefix of payload lines inside a frame
const DATA_PREFIX: &str = "data:";

/// What separates two frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// A blank line (`\n\n`, `\r\n\r\n`), the SSE convention
    #[default]
    BlankLine,
    /// Every newline ends a frame
    Line,
}

impl Framing {
    fn boundary(self) -> &'static Regex {
        static BLANK_LINE: OnceLock<Regex> = OnceLock::new();
        static LINE: OnceLock<Regex> = OnceLock::new();
        match self {
            Self::BlankLine => BLANK_LINE
                .get_or_init(|| Regex::new(r"\r?\n\r?\n").expect("valid frame boundary regex")),
            Self::Line => {
                LINE.get_or_init(|| Regex::new(r"\r?\n").expect("valid line boundary regex"))
            }
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankLine => write!(f, "blank_line"),
            Self::Line => write!(f, "line"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "blank_line" | "blankline" | "event" => Ok(Self::BlankLine),
            "line" | "newline" => Ok(Self::Line),
            other => Err(format!(
                "unknown SSE framing '{}', expected blank_line or line",
                other
            )),
        }
    }
}

/// Carries an incomplete multi-byte sequence over to the next chunk
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    /// Decode everything that is complete; invalid bytes become U+FFFD
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    out.push_str(text);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(text) = std::str::from_utf8(&self.pending[start..start + valid]) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        // Truncated sequence at the end: wait for more bytes
                        None => {
                            start += valid;
                            break;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start += valid + len;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        out
    }

    fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Stateful SSE frame decoder
#[derive(Debug)]
pub struct SseDecoder {
    framing: Framing,
    utf8: Utf8Carry,
    buffer: String,
}

impl SseDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            utf8: Utf8Carry::default(),
            buffer: String::new(),
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Text received but not yet terminated by a frame boundary
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Feed one chunk and return the messages of every frame it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Value> {
        let text = self.utf8.decode(chunk);
        self.buffer.push_str(&text);

        let mut messages = Vec::new();
        let mut consumed = 0;
        for boundary in self.framing.boundary().find_iter(&self.buffer) {
            if let Some(message) = parse_frame(&self.buffer[consumed..boundary.start()]) {
                messages.push(message);
            }
            consumed = boundary.end();
        }
        self.buffer.drain(..consumed);
        messages
    }

    /// End of stream. An unterminated trailing frame is discarded.
    pub fn finish(self) {
        let dropped = self.buffer.len() + self.utf8.pending_len();
        if dropped > 0 {
            debug!(bytes = dropped, "Discarding unterminated SSE frame at end of stream");
        }
    }
}

/// Concatenate the `data:` lines of a frame and turn them into a message.
///
/// Frames without data (or with only empty `data:` lines) yield nothing.
/// Data that is not JSON is wrapped as `{"content": <raw>}`.
fn parse_frame(frame: &str) -> Option<Value> {
    let data: String = frame
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .collect();
    if data.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&data).unwrap_or_else(|_| json!({ "content": data })))
}
