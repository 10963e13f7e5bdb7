//! Display formatting and classification.
//!
//! Pure functions over a single value; nothing here reads registry or
//! history state.

use std::fmt;

use crate::polling::stats::BreakerState;

/// Latency below this is "good" (ms).
pub const LATENCY_GOOD_MS: f64 = 50.0;
/// Latency below this is "warn" (ms).
pub const LATENCY_WARN_MS: f64 = 200.0;

/// Latency classification driving presentation colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LatencyBucket {
    Good,
    Warn,
    Bad,
}

impl LatencyBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            LatencyBucket::Good => "good",
            LatencyBucket::Warn => "warn",
            LatencyBucket::Bad => "bad",
        }
    }
}

impl fmt::Display for LatencyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Liveness classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HealthBucket {
    Online,
    Offline,
}

impl HealthBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthBucket::Online => "online",
            HealthBucket::Offline => "offline",
        }
    }
}

impl fmt::Display for HealthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Circuit-breaker classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerBucket {
    Ok,
    Warn,
    Bad,
    Neutral,
}

impl BreakerBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerBucket::Ok => "ok",
            BreakerBucket::Warn => "warn",
            BreakerBucket::Bad => "bad",
            BreakerBucket::Neutral => "neutral",
        }
    }
}

impl fmt::Display for BreakerBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

pub fn classify_latency(ms: f64) -> LatencyBucket {
    if ms < LATENCY_GOOD_MS {
        LatencyBucket::Good
    } else if ms < LATENCY_WARN_MS {
        LatencyBucket::Warn
    } else {
        LatencyBucket::Bad
    }
}

pub fn classify_health(alive: bool) -> HealthBucket {
    if alive {
        HealthBucket::Online
    } else {
        HealthBucket::Offline
    }
}

pub fn classify_breaker(state: BreakerState) -> BreakerBucket {
    match state {
        BreakerState::Closed => BreakerBucket::Ok,
        BreakerState::HalfOpen => BreakerBucket::Warn,
        BreakerState::Open => BreakerBucket::Bad,
        BreakerState::Unknown => BreakerBucket::Neutral,
    }
}

/// Scale a millisecond latency to µs, ms or s.
pub fn format_latency(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.0}µs", ms * 1000.0)
    } else if ms < 1000.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

/// Render a `[0, 1]` rate as a percentage with two decimals.
pub fn format_error_rate(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// Render a counter delivered as a JSON number as a whole number.
pub fn format_count(value: f64) -> String {
    format!("{:.0}", value)
}

/// Compact label for a backend URL (`http://localhost:9001` → `:9001`).
pub fn short_backend_name(url: &str) -> String {
    match url.strip_prefix("http://localhost") {
        Some(rest) if rest.starts_with(':') => rest.to_string(),
        _ => url.to_string(),
    }
}
