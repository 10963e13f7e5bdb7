//! Aggregate statistics polling.
//!
//! # Data Flow
//! ```text
//! interval tick (5s default, first tick immediate)
//!     → aggregator.rs spawns three independent fetches
//!         GET rate-limit       ─┐
//!         GET circuit-breaker  ─┼→ stats.rs decode {"data": ...}
//!         GET load-balancer    ─┘
//!     → AggregateStats slot replaced on success, kept on failure
//! ```

pub mod aggregator;
pub mod stats;

pub use aggregator::{fetch_json, CycleReport, PollError, PollOutcome, PollingAggregator};
pub use stats::{
    AggregateStats, BreakerState, BreakerStatus, CircuitBreakerStats, LoadBalancerStats,
    RateLimitStats, Resource, Stamped,
};
