//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TelemetryConfig (validated, immutable)
//!     → cloned into the session, stream client and poller
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a new session
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    DashboardConfig, EndpointConfig, HistoryConfig, ObservabilityConfig, PollingConfig,
    ReconnectConfig, StreamConfig, TelemetryConfig,
};
