//! Live replica telemetry client for the load balancer's metrics endpoint.

pub mod config;
pub mod ingest;
pub mod lifecycle;
pub mod observability;
pub mod polling;
pub mod resilience;
pub mod session;
pub mod telemetry;
pub mod view;

pub use config::TelemetryConfig;
pub use lifecycle::{Dashboard, Shutdown};
pub use session::Session;
