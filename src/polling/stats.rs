//! Aggregate statistics resources served by the balancer's admin API.
//!
//! Every resource is wrapped in a `{"data": ...}` envelope. Counters accept
//! any JSON number (`12`, `12.0`, `1.2e1`); a string, a negative or a
//! non-finite value is a decode error. Optional fields simply stay `None`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Response envelope used by the admin API.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Non-negative, finite JSON number.
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(D::Error::custom(format!("expected a non-negative count, got {}", value)))
    }
}

fn optional_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<f64>::deserialize(deserializer)? {
        Some(value) if !value.is_finite() || value < 0.0 => Err(D::Error::custom(format!(
            "expected a non-negative count, got {}",
            value
        ))),
        other => Ok(other),
    }
}

/// Rate limiter configuration and usage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitStats {
    pub enabled: bool,
    /// Limiter algorithm, e.g. "token_bucket" or "sliding_window".
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(deserialize_with = "count")]
    pub global_limit: f64,
    #[serde(deserialize_with = "count")]
    pub per_ip_limit: f64,
    #[serde(deserialize_with = "count")]
    pub active_ips: f64,
    #[serde(default)]
    pub global_tokens: Option<f64>,
}

/// Circuit breaker state reported for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
    Unknown,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
            BreakerState::Unknown => "unknown",
        }
    }

    /// Case-insensitive parse; anything unrecognised is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().replace('-', "_").as_str() {
            "closed" => BreakerState::Closed,
            "open" => BreakerState::Open,
            "half_open" | "halfopen" => BreakerState::HalfOpen,
            _ => BreakerState::Unknown,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BreakerState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(BreakerState::parse(&raw))
    }
}

impl Serialize for BreakerState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Breaker details for one backend.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BreakerStatus {
    pub state: BreakerState,
    #[serde(deserialize_with = "count")]
    pub failure_count: f64,
    pub error_rate: f64,
    #[serde(default, alias = "last_fail_time")]
    pub last_failure_time: Option<String>,
    #[serde(default)]
    pub next_attempt: Option<String>,
}

/// Breaker status keyed by backend URL.
pub type CircuitBreakerStats = BTreeMap<String, BreakerStatus>;

/// Load balancer summary counters. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerStats {
    pub algorithm: Option<String>,
    #[serde(default, deserialize_with = "optional_count")]
    pub total_requests: Option<f64>,
    #[serde(default, deserialize_with = "optional_count")]
    pub active_backends: Option<f64>,
    pub avg_response_time: Option<f64>,
    pub requests_per_minute: Option<f64>,
}

/// The three polled resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    RateLimit,
    CircuitBreaker,
    LoadBalancer,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::RateLimit => "rate_limit",
            Resource::CircuitBreaker => "circuit_breaker",
            Resource::LoadBalancer => "load_balancer",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A value together with the time it was successfully fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Stamped<T> {
    pub fn now(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
        }
    }
}

/// Last good value of each aggregate resource.
///
/// Slots are replaced wholesale on success and left untouched on failure,
/// so a reader always sees a complete, possibly stale, snapshot.
#[derive(Debug, Default)]
pub struct AggregateStats {
    rate_limit: ArcSwapOption<Stamped<RateLimitStats>>,
    circuit_breakers: ArcSwapOption<Stamped<CircuitBreakerStats>>,
    load_balancer: ArcSwapOption<Stamped<LoadBalancerStats>>,
}

impl AggregateStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate_limit(&self) -> Option<Arc<Stamped<RateLimitStats>>> {
        self.rate_limit.load_full()
    }

    pub fn circuit_breakers(&self) -> Option<Arc<Stamped<CircuitBreakerStats>>> {
        self.circuit_breakers.load_full()
    }

    pub fn load_balancer(&self) -> Option<Arc<Stamped<LoadBalancerStats>>> {
        self.load_balancer.load_full()
    }

    pub fn set_rate_limit(&self, value: RateLimitStats) {
        self.rate_limit.store(Some(Arc::new(Stamped::now(value))));
    }

    pub fn set_circuit_breakers(&self, value: CircuitBreakerStats) {
        self.circuit_breakers.store(Some(Arc::new(Stamped::now(value))));
    }

    pub fn set_load_balancer(&self, value: LoadBalancerStats) {
        self.load_balancer.store(Some(Arc::new(Stamped::now(value))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_envelope() {
        let json = r#"{"status":"success","data":{"enabled":true,"type":"token_bucket","global_limit":1000,"per_ip_limit":100,"active_ips":3,"global_tokens":998.5}}"#;
        let env: Envelope<RateLimitStats> = serde_json::from_str(json).unwrap();
        assert_eq!(env.data.kind, "token_bucket");
        assert_eq!(env.data.global_tokens, Some(998.5));

        let without_tokens = r#"{"data":{"enabled":false,"type":"sliding_window","global_limit":1,"per_ip_limit":1,"active_ips":0}}"#;
        let env: Envelope<RateLimitStats> = serde_json::from_str(without_tokens).unwrap();
        assert_eq!(env.data.global_tokens, None);
    }

    #[test]
    fn test_breaker_states_any_case() {
        let json = r#"{"data":{
            "http://localhost:9001":{"state":"CLOSED","failure_count":0,"error_rate":0,"total_calls":10},
            "http://localhost:9002":{"state":"HALF_OPEN","failure_count":3,"error_rate":0.3,"last_fail_time":"2024-05-01T12:00:00Z"},
            "http://localhost:9003":{"state":"open","failure_count":9,"error_rate":0.9,"next_attempt":"2024-05-01T12:00:30Z"},
            "http://localhost:9004":{"state":"melting","failure_count":0,"error_rate":0}
        }}"#;
        let env: Envelope<CircuitBreakerStats> = serde_json::from_str(json).unwrap();
        let states: Vec<BreakerState> = env.data.values().map(|b| b.state).collect();
        assert_eq!(
            states,
            vec![
                BreakerState::Closed,
                BreakerState::HalfOpen,
                BreakerState::Open,
                BreakerState::Unknown
            ]
        );
        assert_eq!(
            env.data["http://localhost:9002"].last_failure_time.as_deref(),
            Some("2024-05-01T12:00:00Z")
        );
    }

    #[test]
    fn test_load_balancer_optional_fields() {
        let env: Envelope<LoadBalancerStats> =
            serde_json::from_str(r#"{"data":{"algorithm":"round_robin"}}"#).unwrap();
        assert_eq!(env.data.algorithm.as_deref(), Some("round_robin"));
        assert_eq!(env.data.total_requests, None);
        assert_eq!(env.data.active_backends, None);

        let bad = serde_json::from_str::<Envelope<LoadBalancerStats>>(
            r#"{"data":{"total_requests":"many"}}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_counters_accept_any_json_number() {
        let rl: Envelope<RateLimitStats> = serde_json::from_str(
            r#"{"data":{"enabled":true,"type":"token_bucket","global_limit":1e3,"per_ip_limit":100.0,"active_ips":2}}"#,
        )
        .unwrap();
        assert_eq!(rl.data.global_limit, 1000.0);
        assert_eq!(rl.data.per_ip_limit, 100.0);

        let lb: Envelope<LoadBalancerStats> =
            serde_json::from_str(r#"{"data":{"total_requests":1200.0,"active_backends":3}}"#).unwrap();
        assert_eq!(lb.data.total_requests, Some(1200.0));
        assert_eq!(lb.data.active_backends, Some(3.0));

        let breakers: Envelope<CircuitBreakerStats> = serde_json::from_str(
            r#"{"data":{"b":{"state":"OPEN","failure_count":4.0,"error_rate":0.4}}}"#,
        )
        .unwrap();
        assert_eq!(breakers.data["b"].failure_count, 4.0);
    }

    #[test]
    fn test_counters_reject_negative_values() {
        assert!(serde_json::from_str::<Envelope<LoadBalancerStats>>(
            r#"{"data":{"total_requests":-1}}"#
        )
        .is_err());
        assert!(serde_json::from_str::<Envelope<RateLimitStats>>(
            r#"{"data":{"enabled":true,"type":"x","global_limit":-5,"per_ip_limit":1,"active_ips":0}}"#
        )
        .is_err());
    }

    #[test]
    fn test_slots_replace_wholesale() {
        let stats = AggregateStats::new();
        assert!(stats.load_balancer().is_none());

        stats.set_load_balancer(LoadBalancerStats {
            algorithm: Some("round_robin".into()),
            total_requests: Some(10.0),
            ..Default::default()
        });
        let first = stats.load_balancer().unwrap();

        stats.set_load_balancer(LoadBalancerStats {
            active_backends: Some(2.0),
            ..Default::default()
        });
        let second = stats.load_balancer().unwrap();

        assert_eq!(first.value.total_requests, Some(10.0));
        assert_eq!(second.value.total_requests, None);
        assert_eq!(second.value.active_backends, Some(2.0));
    }
}
