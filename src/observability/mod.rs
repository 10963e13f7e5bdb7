//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Stream client, poller, session:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stderr
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Every absorbed failure is logged; none is escalated
//! - Session ID is attached as a field to lifecycle events

pub mod logging;
pub mod metrics;
