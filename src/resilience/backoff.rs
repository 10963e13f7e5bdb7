//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectConfig;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Attempt counter producing reconnect delays.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    /// 0 = unlimited.
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            base_ms: config.base_delay_ms,
            max_ms: config.max_delay_ms,
            max_attempts: config.max_attempts,
            attempts: 0,
        }
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_attempts != 0 && self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts = self.attempts.saturating_add(1);
        Some(calculate_backoff(self.attempts, self.base_ms, self.max_ms))
    }

    /// Forget past failures after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);
    }

    #[test]
    fn test_attempt_limit_and_reset() {
        let config = ReconnectConfig {
            enabled: true,
            base_delay_ms: 10,
            max_delay_ms: 1000,
            max_attempts: 2,
        };
        let mut backoff = Backoff::new(&config);

        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().unwrap() >= Duration::from_millis(20));
        assert!(backoff.next_delay().is_none());
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        let first = backoff.next_delay().unwrap();
        assert!(first >= Duration::from_millis(10) && first < Duration::from_millis(20));
    }

    #[test]
    fn test_unlimited_attempts() {
        let mut backoff = Backoff::new(&ReconnectConfig::default());
        for _ in 0..100 {
            assert!(backoff.next_delay().unwrap() <= Duration::from_millis(33_000));
        }
    }
}
