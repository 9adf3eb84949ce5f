//! Per-job retry policy with exponential backoff.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;

/// Retry budget and backoff curve carried by every dispatch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total delivery attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Symmetric jitter as a fraction of the delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay_ms: config.initial_delay_ms,
            max_delay_ms: config.max_delay_ms,
            multiplier: config.multiplier,
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `attempts` have been made.
    ///
    /// A policy always allows at least one attempt.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts.max(1)
    }

    /// Delay before the next attempt, given `attempts` already made (>= 1).
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_delay_ms as f64);

        let jitter_range = capped * self.jitter_factor;
        let delayed = if jitter_range > 0.0 {
            let jitter = rand::rng().random_range(-jitter_range..jitter_range);
            capped + jitter
        } else {
            capped
        };

        Duration::from_millis(delayed.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, jitter_factor: f64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
            multiplier: 2.0,
            jitter_factor,
        }
    }

    #[test]
    fn test_delays_grow_exponentially() {
        let p = policy(5, 0.0);

        assert_eq!(p.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(p.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(p.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let p = policy(20, 0.0);
        assert_eq!(p.delay_for_attempt(10), Duration::from_millis(1000));
        assert_eq!(p.delay_for_attempt(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let p = policy(5, 0.5);
        for _ in 0..100 {
            let delay = p.delay_for_attempt(2).as_millis();
            assert!((100..=300).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_attempt_budget() {
        let p = policy(3, 0.0);
        assert!(p.allows_retry(1));
        assert!(p.allows_retry(2));
        assert!(!p.allows_retry(3));

        let zero = policy(0, 0.0);
        assert!(!zero.allows_retry(1));
    }

    #[test]
    fn test_from_settings() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 250,
            max_delay_ms: 10_000,
            multiplier: 3.0,
            jitter_factor: 4.0,
        };

        let p = RetryPolicy::from(&config);
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.initial_delay_ms, 250);
        assert_eq!(p.jitter_factor, 1.0);
    }
}
