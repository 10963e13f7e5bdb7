//! Polling aggregator.
//!
//! # Responsibilities
//! - Refresh the three aggregate resources immediately, then on a fixed interval
//! - Isolate failures so one resource never blocks or clears another
//! - Discard results that arrive after the session was retired
//!
//! # Design Decisions
//! - Fixed cadence, no jitter, no adaptation
//! - Each fetch of a cycle runs as its own task; shutdown stops new cycles
//!   but does not wait for fetches already in flight
//! - Every fetch carries the session generation it started under

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use url::Url;

use crate::config::{PollingConfig, TelemetryConfig};
use crate::observability::metrics;
use crate::polling::stats::{
    AggregateStats, CircuitBreakerStats, Envelope, LoadBalancerStats, RateLimitStats, Resource,
};
use crate::session::Session;

/// Errors from a single resource fetch.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid resource URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("polling interval must be greater than zero")]
    ZeroInterval,
}

/// What happened to one resource in a cycle.
#[derive(Debug)]
pub enum PollOutcome {
    /// Fresh value stored.
    Applied,
    /// Fetched, but the session moved on; value dropped.
    Discarded,
    /// Fetch failed; previous value kept.
    Failed(PollError),
}

impl PollOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PollOutcome::Applied)
    }
}

/// Outcomes of one full cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub rate_limit: PollOutcome,
    pub circuit_breaker: PollOutcome,
    pub load_balancer: PollOutcome,
}

#[derive(Debug, Clone)]
struct Targets {
    rate_limit: Url,
    circuit_breaker: Url,
    load_balancer: Url,
}

/// Periodic fetcher of aggregate statistics.
pub struct PollingAggregator {
    client: Client,
    config: PollingConfig,
    targets: Targets,
    session: Arc<Session>,
}

impl PollingAggregator {
    pub fn new(config: &TelemetryConfig, session: Arc<Session>) -> Result<Self, PollError> {
        if config.polling.interval_ms == 0 {
            return Err(PollError::ZeroInterval);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.polling.timeout_ms))
            .build()
            .map_err(PollError::Client)?;

        let endpoint = &config.endpoint;
        let targets = Targets {
            rate_limit: config.resource_url(&endpoint.rate_limit_path)?,
            circuit_breaker: config.resource_url(&endpoint.circuit_breaker_path)?,
            load_balancer: config.resource_url(&endpoint.load_balancer_path)?,
        };

        Ok(Self {
            client,
            config: config.polling.clone(),
            targets,
            session,
        })
    }

    /// Poll until shutdown. The first cycle starts immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Aggregate polling disabled");
            return;
        }

        tracing::info!(
            session = %self.session.id(),
            interval_ms = self.config.interval_ms,
            "Polling aggregator starting"
        );

        let mut ticker = time::interval(Duration::from_millis(self.config.interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.spawn_cycle();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Polling aggregator received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Start one cycle without waiting for it.
    fn spawn_cycle(&self) {
        let generation = self.session.generation();
        if !self.session.is_current(generation) {
            return;
        }

        tokio::spawn(refresh::<RateLimitStats>(
            self.client.clone(),
            self.targets.rate_limit.clone(),
            Resource::RateLimit,
            self.session.clone(),
            generation,
            AggregateStats::set_rate_limit,
        ));
        tokio::spawn(refresh::<CircuitBreakerStats>(
            self.client.clone(),
            self.targets.circuit_breaker.clone(),
            Resource::CircuitBreaker,
            self.session.clone(),
            generation,
            AggregateStats::set_circuit_breakers,
        ));
        tokio::spawn(refresh::<LoadBalancerStats>(
            self.client.clone(),
            self.targets.load_balancer.clone(),
            Resource::LoadBalancer,
            self.session.clone(),
            generation,
            AggregateStats::set_load_balancer,
        ));
    }

    /// Run one cycle and wait for all three fetches.
    pub async fn poll_once(&self) -> CycleReport {
        let generation = self.session.generation();
        let (rate_limit, circuit_breaker, load_balancer) = tokio::join!(
            refresh::<RateLimitStats>(
                self.client.clone(),
                self.targets.rate_limit.clone(),
                Resource::RateLimit,
                self.session.clone(),
                generation,
                AggregateStats::set_rate_limit,
            ),
            refresh::<CircuitBreakerStats>(
                self.client.clone(),
                self.targets.circuit_breaker.clone(),
                Resource::CircuitBreaker,
                self.session.clone(),
                generation,
                AggregateStats::set_circuit_breakers,
            ),
            refresh::<LoadBalancerStats>(
                self.client.clone(),
                self.targets.load_balancer.clone(),
                Resource::LoadBalancer,
                self.session.clone(),
                generation,
                AggregateStats::set_load_balancer,
            ),
        );

        CycleReport {
            rate_limit,
            circuit_breaker,
            load_balancer,
        }
    }
}

/// Fetch one resource and store it if the session is still current.
async fn refresh<T>(
    client: Client,
    url: Url,
    resource: Resource,
    session: Arc<Session>,
    generation: u64,
    store: fn(&AggregateStats, T),
) -> PollOutcome
where
    T: DeserializeOwned,
{
    match fetch_json::<Envelope<T>>(&client, &url).await {
        Ok(envelope) => {
            if !session.store_aggregate(generation, |stats| store(stats, envelope.data)) {
                tracing::debug!(%resource, "Discarding poll result from a retired session");
                return PollOutcome::Discarded;
            }
            tracing::trace!(%resource, "Aggregate refreshed");
            PollOutcome::Applied
        }
        Err(e) => {
            metrics::record_poll_failure(resource.as_str());
            tracing::warn!(%resource, error = %e, "Poll failed, keeping previous value");
            PollOutcome::Failed(e)
        }
    }
}

/// GET a JSON resource, separating transport, status and decode failures.
pub async fn fetch_json<T: DeserializeOwned>(client: &Client, url: &Url) -> Result<T, PollError> {
    let transport = |source| PollError::Transport {
        url: url.to_string(),
        source,
    };

    let response = client.get(url.clone()).send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        return Err(PollError::Status {
            url: url.to_string(),
            status,
        });
    }

    let body = response.text().await.map_err(transport)?;
    serde_json::from_str(&body).map_err(|source| PollError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_from_config() {
        let mut config = TelemetryConfig::default();
        config.endpoint.base_url = "http://10.1.1.1:9000".to_string();
        let poller = PollingAggregator::new(&config, Arc::new(Session::new(60))).unwrap();

        assert_eq!(poller.targets.rate_limit.as_str(), "http://10.1.1.1:9000/api/rate-limit");
        assert_eq!(
            poller.targets.circuit_breaker.as_str(),
            "http://10.1.1.1:9000/api/circuit-breaker"
        );
        assert_eq!(
            poller.targets.load_balancer.as_str(),
            "http://10.1.1.1:9000/api/load-balancer"
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = TelemetryConfig::default();
        config.polling.interval_ms = 0;
        let result = PollingAggregator::new(&config, Arc::new(Session::new(60)));
        assert!(matches!(result, Err(PollError::ZeroInterval)));
    }

    #[tokio::test]
    async fn test_unreachable_resources_fail_independently() {
        let mut config = TelemetryConfig::default();
        // Port 9 (discard) is closed on test hosts.
        config.endpoint.base_url = "http://127.0.0.1:9".to_string();
        config.polling.timeout_ms = 500;
        let session = Arc::new(Session::new(60));
        let poller = PollingAggregator::new(&config, session.clone()).unwrap();

        let report = poller.poll_once().await;
        assert!(matches!(report.rate_limit, PollOutcome::Failed(PollError::Transport { .. })));
        assert!(matches!(report.circuit_breaker, PollOutcome::Failed(_)));
        assert!(matches!(report.load_balancer, PollOutcome::Failed(_)));
        assert!(session.aggregates().rate_limit().is_none());
    }
}
