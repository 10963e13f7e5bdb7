//! Metrics collection and exposition.
//!
//! # Metrics
//! - `telemetry_messages_total` (counter): stream messages applied, by kind
//! - `telemetry_decode_failures_total` (counter): dropped stream payloads
//! - `telemetry_stream_disconnects_total` (counter): stream connection losses
//! - `telemetry_poll_failures_total` (counter): failed polls, by resource
//! - `telemetry_replicas` (gauge): replicas currently in the registry
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing unless `init_metrics` ran.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_stream_message(kind: &'static str) {
    counter!("telemetry_messages_total", "kind" => kind).increment(1);
}

pub fn record_decode_failure() {
    counter!("telemetry_decode_failures_total").increment(1);
}

pub fn record_stream_disconnect() {
    counter!("telemetry_stream_disconnects_total").increment(1);
}

pub fn record_poll_failure(resource: &'static str) {
    counter!("telemetry_poll_failures_total", "resource" => resource).increment(1);
}

pub fn record_registry_size(replicas: usize) {
    gauge!("telemetry_replicas").set(replicas as f64);
}
