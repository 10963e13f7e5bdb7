//! Replica telemetry engine.
//!
//! # Data Flow
//! ```text
//! stream payload (text)
//!     → protocol.rs (decode + validate → Message)
//!     → registry.rs (fold Snapshot/Delta into ordered replica set)
//!     → history.rs  (one sample per delta-touched record)
//!     → format.rs   (buckets and unit-scaled strings for display)
//! ```
//!
//! # Design Decisions
//! - Registry and history operations are synchronous and never yield
//! - Malformed input stops at the protocol boundary
//! - History is bounded per replica; eviction is FIFO

pub mod format;
pub mod history;
pub mod protocol;
pub mod record;
pub mod registry;

pub use history::{HistoryStore, HistorySummary, MetricSample, MAX_SAMPLES};
pub use protocol::{decode, DecodeError, Message};
pub use record::{ReplicaId, ReplicaRecord};
pub use registry::{Applied, LiveRegistry};
