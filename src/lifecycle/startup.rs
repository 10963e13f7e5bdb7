//! Session orchestration.
//!
//! # Responsibilities
//! - Create the session context
//! - Start the stream client and the polling aggregator against it
//! - Tear both down deterministically
//!
//! # Design Decisions
//! - Teardown retires the session first, so late stream messages and
//!   in-flight poll results are dropped rather than applied
//! - Dropping a `Dashboard` without `shutdown` still releases everything

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::TelemetryConfig;
use crate::ingest::{StreamClient, StreamHandle};
use crate::lifecycle::Shutdown;
use crate::polling::{PollError, PollingAggregator};
use crate::session::Session;

/// Errors that prevent a session from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ValidationError>),

    #[error("invalid stream URL: {0}")]
    StreamUrl(#[from] url::ParseError),

    #[error("failed to set up polling: {0}")]
    Polling(#[from] PollError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A running viewing session.
#[derive(Debug)]
pub struct Dashboard {
    session: Arc<Session>,
    shutdown: Shutdown,
    stream: Option<StreamHandle>,
    poller: Option<JoinHandle<()>>,
}

impl Dashboard {
    /// Create a session and start ingestion and polling. Must be called
    /// within a Tokio runtime.
    pub fn start(config: &TelemetryConfig) -> Result<Self, StartupError> {
        validate_config(config).map_err(StartupError::Config)?;

        let session = Arc::new(Session::new(config.history.max_samples));
        let shutdown = Shutdown::new();

        // Everything fallible is built before any task is spawned.
        let client = StreamClient::new(config, session.clone())?;
        let aggregator = if config.polling.enabled {
            Some(PollingAggregator::new(config, session.clone())?)
        } else {
            None
        };

        let poller = aggregator.map(|aggregator| tokio::spawn(aggregator.run(shutdown.subscribe())));
        tracing::info!(
            session = %session.id(),
            stream_url = %client.url(),
            polling = config.polling.enabled,
            "Dashboard session started"
        );
        let stream = client.spawn(shutdown.subscribe());

        Ok(Self {
            session,
            shutdown,
            stream: Some(stream),
            poller,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether the stream connection loop has ended on its own.
    pub fn stream_finished(&self) -> bool {
        self.stream.as_ref().map_or(true, StreamHandle::is_finished)
    }

    /// Retire the session, signal both tasks and wait for them to stop.
    /// In-flight poll fetches are not awaited.
    pub async fn shutdown(mut self) {
        self.session.retire();
        self.shutdown.trigger();

        if let Some(stream) = self.stream.take() {
            stream.close().await;
        }
        if let Some(poller) = self.poller.take() {
            if let Err(e) = poller.await {
                tracing::error!(error = %e, "Polling task failed");
            }
        }

        tracing::info!(session = %self.session.id(), "Dashboard session closed");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.session.retire();
        self.shutdown.trigger();
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}
