//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Stream disconnect:
//!     → backoff.rs (next delay, or give up after max attempts)
//!     → reconnect
//!
//! Poll request:
//!     → per-request timeout (reqwest client)
//!     → failure isolated to that one resource
//! ```
//!
//! # Design Decisions
//! - Delays double per attempt, capped, plus up to 10% jitter
//! - A successful connection resets the attempt counter

pub mod backoff;
