//! Replica record as delivered by the balancer's metrics stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::protocol::DecodeError;

/// Stable identifier of a replica.
pub type ReplicaId = u32;

/// Current state of one backend replica.
///
/// Identity is `id`; every other field is replaced wholesale on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaRecord {
    pub id: ReplicaId,
    pub url: String,
    /// Exponential moving average of response latency, in milliseconds.
    pub ema_ms: f64,
    /// Fraction of failed requests, in `[0, 1]`.
    pub error_rate: f64,
    pub alive: bool,
    pub last_checked: DateTime<Utc>,
}

impl ReplicaRecord {
    /// Check the numeric ranges serde cannot express.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if !self.ema_ms.is_finite() || self.ema_ms < 0.0 {
            return Err(DecodeError::InvalidField {
                id: self.id,
                field: "ema_ms",
                value: self.ema_ms,
            });
        }
        if !self.error_rate.is_finite() || !(0.0..=1.0).contains(&self.error_rate) {
            return Err(DecodeError::InvalidField {
                id: self.id,
                field: "error_rate",
                value: self.error_rate,
            });
        }
        Ok(())
    }
}
