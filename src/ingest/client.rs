//! Streaming ingestion client.
//!
//! # Responsibilities
//! - Own the single WebSocket connection of a session
//! - Decode every inbound frame and fold it into the session; a frame is one
//!   message, or several newline-delimited ones
//! - Drop malformed payloads without touching the connection
//! - Optionally reconnect with exponential backoff
//!
//! # Design Decisions
//! - No hello/ack: the server pushes an initial snapshot on connect
//! - Frames are processed strictly in arrival order
//! - Reconnection is opt-in; by default a lost stream leaves the last
//!   known registry on display

use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite};
use url::Url;

use crate::config::{ReconnectConfig, TelemetryConfig};
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::session::Session;
use crate::telemetry::{Applied, DecodeError};

/// Errors that end one streaming connection.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("stream transport error: {0}")]
    Transport(#[source] tungstenite::Error),
}

/// How a connection ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamEnd {
    /// Server sent a close frame or the stream ran dry.
    Closed,
    /// Shutdown was requested.
    Shutdown,
}

/// WebSocket client feeding one session.
pub struct StreamClient {
    url: Url,
    reconnect: ReconnectConfig,
    session: Arc<Session>,
}

impl StreamClient {
    pub fn new(config: &TelemetryConfig, session: Arc<Session>) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: config.stream_url()?,
            reconnect: config.stream.reconnect.clone(),
            session,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Run on a background task. The returned handle owns the connection.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> StreamHandle {
        let session = self.session.clone();
        let task = tokio::spawn(self.run(shutdown));
        StreamHandle {
            task: Some(task),
            session,
        }
    }

    /// Connection loop. Returns when the stream ends for good or on shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut backoff = Backoff::new(&self.reconnect);

        tracing::info!(
            session = %self.session.id(),
            url = %self.url,
            reconnect = self.reconnect.enabled,
            "Stream client starting"
        );

        loop {
            let mut connected = false;
            let outcome = self.connect_and_stream(&mut connected, &mut shutdown).await;

            match outcome {
                Ok(StreamEnd::Shutdown) => {
                    tracing::info!("Stream client received shutdown signal, closing connection");
                    return;
                }
                Ok(StreamEnd::Closed) => {
                    tracing::warn!(url = %self.url, "Telemetry stream closed by server");
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Telemetry stream failed");
                }
            }
            metrics::record_stream_disconnect();

            if !self.reconnect.enabled {
                tracing::info!("Reconnection disabled; keeping last known replica state");
                return;
            }
            if connected {
                backoff.reset();
            }

            let Some(delay) = backoff.next_delay() else {
                tracing::error!(
                    attempts = backoff.attempts(),
                    "Giving up on telemetry stream after repeated failures"
                );
                return;
            };

            tracing::info!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting to telemetry stream"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Stream client received shutdown signal while waiting to reconnect");
                    return;
                }
            }
        }
    }

    async fn connect_and_stream(
        &self,
        connected: &mut bool,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<StreamEnd, StreamError> {
        let connect = connect_async(self.url.as_str());
        let (mut ws, _response) = tokio::select! {
            result = connect => result.map_err(|source| StreamError::Connect {
                url: self.url.to_string(),
                source,
            })?,
            _ = shutdown.recv() => return Ok(StreamEnd::Shutdown),
        };
        *connected = true;
        tracing::info!(url = %self.url, "Telemetry stream connected");

        loop {
            let frame = tokio::select! {
                frame = ws.next() => frame,
                _ = shutdown.recv() => {
                    let _ = ws.close(None).await;
                    return Ok(StreamEnd::Shutdown);
                }
            };

            let Some(frame) = frame else {
                return Ok(StreamEnd::Closed);
            };

            match frame.map_err(StreamError::Transport)? {
                tungstenite::Message::Text(text) => self.handle_payload(text.as_str()),
                tungstenite::Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                    Ok(text) => self.handle_payload(text),
                    Err(e) => {
                        metrics::record_decode_failure();
                        tracing::warn!(error = %e, "Dropping non UTF-8 binary frame");
                    }
                },
                tungstenite::Message::Close(close) => {
                    tracing::debug!(?close, "Close frame received");
                    return Ok(StreamEnd::Closed);
                }
                // ping/pong are answered by tungstenite
                _ => {}
            }
        }
    }

    /// Apply a frame as one message, or as newline-delimited messages in
    /// order when the whole frame does not decode.
    fn handle_payload(&self, payload: &str) {
        match self.session.ingest_text(payload) {
            Err(e) if payload.trim().lines().nth(1).is_some() => {
                tracing::trace!(error = %e, "Frame is not a single message, decoding per line");
                for line in payload.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    self.record_outcome(self.session.ingest_text(line));
                }
            }
            outcome => self.record_outcome(outcome),
        }
    }

    fn record_outcome(&self, outcome: Result<Option<Applied>, DecodeError>) {
        match outcome {
            Ok(Some(applied)) => {
                metrics::record_stream_message(applied.kind());
                tracing::trace!(kind = applied.kind(), "Stream message applied");
            }
            Ok(None) => {
                tracing::debug!("Session retired, dropping stream message");
            }
            Err(e) => {
                metrics::record_decode_failure();
                tracing::warn!(error = %e, "Dropping malformed stream message");
            }
        }
    }
}

/// Scoped ownership of a running stream client.
///
/// Dropping the handle (or awaiting `close`) aborts the connection task and
/// retires the session, so no message is applied after the observer is gone.
#[derive(Debug)]
pub struct StreamHandle {
    task: Option<JoinHandle<()>>,
    session: Arc<Session>,
}

impl StreamHandle {
    /// Whether the connection loop has ended on its own.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Retire the session, stop the task and wait for it to unwind.
    pub async fn close(mut self) {
        self.session.retire();
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Stream task panicked");
                }
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.session.retire();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
