//! Streaming chat requests
//!
//! A stream moves `Connecting → Streaming → Completed | Failed`, or to
//! `Aborted` once the caller cancels. The sink sees at most one terminal
//! callback and nothing at all after an abort.

use super::decoder::{Framing, SseDecoder};
use super::types::{ChatRequest, StreamError, StreamEvent, StreamState};
use crate::session::SessionContext;
use crate::ClientConfig;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receiver of decoded stream messages
pub trait StreamSink: Send {
    fn on_message(&mut self, message: Value);
    fn on_complete(&mut self);
    fn on_error(&mut self, error: StreamError);
}

impl StreamSink for mpsc::UnboundedSender<StreamEvent> {
    fn on_message(&mut self, message: Value) {
        let _ = self.send(StreamEvent::Message(message));
    }

    fn on_complete(&mut self) {
        let _ = self.send(StreamEvent::Completed);
    }

    fn on_error(&mut self, error: StreamError) {
        let _ = self.send(StreamEvent::Failed(error));
    }
}

/// Drive a chunked body through the decoder into the sink.
///
/// Returns the terminal state. Cancellation is checked before every chunk and
/// every delivered message.
pub async fn pump<S, B, E, K>(
    chunks: S,
    mut decoder: SseDecoder,
    sink: &mut K,
    cancel: &CancellationToken,
) -> StreamState
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
    K: StreamSink + ?Sized,
{
    tokio::pin!(chunks);
    let mut delivered = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamState::Aborted,
            next = chunks.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                for message in decoder.feed(chunk.as_ref()) {
                    if cancel.is_cancelled() {
                        return StreamState::Aborted;
                    }
                    sink.on_message(message);
                    delivered += 1;
                }
            }
            Some(Err(e)) => {
                if cancel.is_cancelled() {
                    return StreamState::Aborted;
                }
                warn!(error = %e, delivered, "Chat stream interrupted");
                sink.on_error(StreamError::Transport(e.to_string()));
                return StreamState::Failed;
            }
            None => {
                decoder.finish();
                if cancel.is_cancelled() {
                    return StreamState::Aborted;
                }
                debug!(delivered, "Chat stream completed");
                sink.on_complete();
                return StreamState::Completed;
            }
        }
    }
}

/// Handle on a running stream
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<StreamState>,
}

impl StreamHandle {
    /// Stop the stream; safe to call in any state, any number of times
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Token that aborts this stream when cancelled
    pub fn abort_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the terminal state
    pub async fn finished(self) -> StreamState {
        match self.task.await {
            Ok(state) => state,
            Err(e) if e.is_cancelled() => StreamState::Aborted,
            Err(e) => {
                warn!(error = %e, "Chat stream task failed");
                StreamState::Failed
            }
        }
    }
}

/// Opens streaming chat requests against the chat endpoint
#[derive(Clone)]
pub struct ChatStreamer {
    http: Client,
    chat_url: String,
    framing: Framing,
    session: Arc<SessionContext>,
}

impl ChatStreamer {
    /// Streams have no overall timeout; only connecting is bounded.
    pub fn new(config: &ClientConfig, session: Arc<SessionContext>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            chat_url: config.chat_url.clone(),
            framing: config.sse_framing,
            session,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Start a stream delivering into `sink`
    pub fn open<K>(&self, request: ChatRequest, sink: K) -> StreamHandle
    where
        K: StreamSink + 'static,
    {
        let cancel = CancellationToken::new();
        let streamer = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { streamer.run(request, sink, token).await });
        StreamHandle { cancel, task }
    }

    /// Start a stream whose events arrive on a channel
    pub fn open_channel(
        &self,
        request: ChatRequest,
    ) -> (StreamHandle, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.open(request, tx), rx)
    }

    async fn run<K: StreamSink>(
        self,
        request: ChatRequest,
        mut sink: K,
        cancel: CancellationToken,
    ) -> StreamState {
        debug!(url = %self.chat_url, state = ?StreamState::Connecting, "Opening chat stream");

        let mut req = self
            .http
            .post(&self.chat_url)
            .header(ACCEPT, "text/event-stream")
            .json(&request);
        if let Some(token) = self.session.credential().await {
            req = req.header(AUTHORIZATION, token);
        }

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamState::Aborted,
            sent = req.send() => sent,
        };
        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                if cancel.is_cancelled() {
                    return StreamState::Aborted;
                }
                warn!(error = %e, url = %self.chat_url, "Chat stream could not connect");
                sink.on_error(StreamError::Transport(e.to_string()));
                return StreamState::Failed;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamState::Aborted,
                body = response.text() => body.unwrap_or_default(),
            };
            warn!(status = status.as_u16(), %body, "Chat stream rejected");
            sink.on_error(StreamError::Status {
                status: status.as_u16(),
                body,
            });
            return StreamState::Failed;
        }

        info!(state = ?StreamState::Streaming, framing = %self.framing, "Chat stream open");
        pump(
            response.bytes_stream(),
            SseDecoder::new(self.framing),
            &mut sink,
            &cancel,
        )
        .await
    }
}
