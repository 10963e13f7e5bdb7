//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the telemetry
//! client. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration for the telemetry client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Where the balancer's operational port lives.
    pub endpoint: EndpointConfig,

    /// Aggregate statistics polling.
    pub polling: PollingConfig,

    /// Per-replica rolling history.
    pub history: HistoryConfig,

    /// Streaming connection behaviour.
    pub stream: StreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Terminal dashboard settings.
    pub dashboard: DashboardConfig,
}

impl TelemetryConfig {
    /// Parsed base URL of the balancer's operational port.
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.endpoint.base_url)
    }

    /// WebSocket URL of the telemetry stream, derived from the base URL scheme.
    pub fn stream_url(&self) -> Result<Url, url::ParseError> {
        let mut url = self.base_url()?.join(&self.endpoint.stream_path)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http(s) -> ws(s) is a permitted special-scheme switch
        let _ = url.set_scheme(scheme);
        Ok(url)
    }

    /// Absolute URL of one of the polled resources.
    pub fn resource_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url()?.join(path)
    }
}

/// Balancer endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL of the admin/metrics server (e.g., "http://localhost:9000").
    pub base_url: String,

    /// Path of the streaming endpoint.
    pub stream_path: String,

    /// Path of the rate-limit status resource.
    pub rate_limit_path: String,

    /// Path of the circuit-breaker status resource.
    pub circuit_breaker_path: String,

    /// Path of the load-balancer summary resource.
    pub load_balancer_path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            stream_path: "/metrics/ws".to_string(),
            rate_limit_path: "/api/rate-limit".to_string(),
            circuit_breaker_path: "/api/circuit-breaker".to_string(),
            load_balancer_path: "/api/load-balancer".to_string(),
        }
    }
}

/// Polling aggregator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Enable aggregate polling.
    pub enabled: bool,

    /// Fixed interval between poll cycles in milliseconds.
    pub interval_ms: u64,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 5000,
            timeout_ms: 3000,
        }
    }
}

/// History store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum samples retained per replica.
    pub max_samples: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_samples: crate::telemetry::history::MAX_SAMPLES,
        }
    }
}

/// Streaming connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StreamConfig {
    /// Reconnection policy after a disconnect.
    pub reconnect: ReconnectConfig,
}

/// Reconnection configuration.
///
/// Disabled by default: a dropped stream leaves the last known registry on
/// screen until the session is restarted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Enable reconnection with exponential backoff.
    pub enabled: bool,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Maximum consecutive attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_attempts: 0,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

/// Terminal dashboard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Redraw interval in milliseconds.
    pub refresh_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { refresh_ms: 1000 }
    }
}
