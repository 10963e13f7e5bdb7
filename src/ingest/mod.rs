//! Streaming ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! /metrics/ws frame
//!     → client.rs (split lines, decode)
//!     → Session::apply (registry merge + history append, atomic)
//!
//! On disconnect:
//!     → log + count
//!     → stop (default) or reconnect with backoff
//! ```

pub mod client;

pub use client::{StreamClient, StreamError, StreamHandle};
