//! Reconnect backoff policy.
//!
//! Pure computation over two inputs: how many retries the current outage has
//! used (`attempt`), and how many transport errors the link has produced since
//! it was last healthy (`consecutive_failures`). A worse failure history means
//! a larger base delay, fewer immediate retries, and a longer cooldown once
//! those retries are spent.
//!
//! Every threshold is a tunable field; the defaults are the values the feed
//! has been run with and carry no deeper meaning than "retries shrink and
//! cooldowns grow as the failure history worsens".

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MxError;

/// Retry/backoff/cooldown tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Immediate retries allowed for a healthy link.
    pub max_retries: u32,
    /// Immediate retries allowed once the failure history is long.
    pub reduced_max_retries: u32,
    /// Failure count above which `reduced_max_retries` applies.
    pub high_failure_threshold: u32,

    /// Base delay for a healthy link.
    pub base_delay_ms: u64,
    /// Failure count above which `moderate_delay_ms` is the base.
    pub moderate_failure_threshold: u32,
    pub moderate_delay_ms: u64,
    /// Failure count above which `severe_delay_ms` is the base.
    pub severe_failure_threshold: u32,
    pub severe_delay_ms: u64,
    /// Per-attempt growth factor. Must be `>= 1.0`.
    pub multiplier: f64,
    /// Upper bound on any single backoff delay.
    pub max_delay_ms: u64,

    /// Cooldown after retries are exhausted.
    pub cooldown_ms: u64,
    /// Cooldown when the failure history is above `severe_failure_threshold`.
    pub severe_cooldown_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            reduced_max_retries: 2,
            high_failure_threshold: 20,
            base_delay_ms: 45_000,
            moderate_failure_threshold: 5,
            moderate_delay_ms: 90_000,
            severe_failure_threshold: 10,
            severe_delay_ms: 120_000,
            multiplier: 1.5,
            max_delay_ms: 180_000,
            cooldown_ms: 120_000,
            severe_cooldown_ms: 300_000,
        }
    }
}

impl RetryPolicy {
    /// Retry ceiling for a link with the given failure history.
    pub fn max_retries(&self, consecutive_failures: u32) -> u32 {
        if consecutive_failures > self.high_failure_threshold {
            self.reduced_max_retries
        } else {
            self.max_retries
        }
    }

    /// Delay before retry number `attempt` (0-based).
    ///
    /// Non-decreasing in `attempt` and never above `max_delay_ms`.
    pub fn backoff_delay(&self, attempt: u32, consecutive_failures: u32) -> Duration {
        let base = if consecutive_failures > self.severe_failure_threshold {
            self.severe_delay_ms
        } else if consecutive_failures > self.moderate_failure_threshold {
            self.moderate_delay_ms
        } else {
            self.base_delay_ms
        };

        // Exponent clamp keeps powi in range; the cap is reached long before.
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let raw = base as f64 * factor;
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Cooldown window entered once `max_retries` is exhausted.
    pub fn cooldown_duration(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures > self.severe_failure_threshold {
            Duration::from_millis(self.severe_cooldown_ms)
        } else {
            Duration::from_millis(self.cooldown_ms)
        }
    }

    /// Reject settings that would break the policy's guarantees.
    pub fn validate(&self) -> Result<(), MxError> {
        if !(self.multiplier >= 1.0) {
            return Err(MxError::Config(format!("retry.multiplier must be >= 1.0, got {}", self.multiplier)));
        }
        if self.base_delay_ms == 0 {
            return Err(MxError::Config("retry.base_delay_ms must be > 0".into()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(MxError::Config(format!(
                "retry.max_delay_ms ({}) is below retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        if self.max_retries == 0 || self.reduced_max_retries == 0 {
            return Err(MxError::Config("retry ceilings must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_monotonic_and_capped() {
        let p = RetryPolicy::default();
        for failures in [0, 6, 11, 25] {
            let mut prev = Duration::ZERO;
            for attempt in 0..40 {
                let d = p.backoff_delay(attempt, failures);
                assert!(d >= prev, "attempt {attempt} failures {failures}: {d:?} < {prev:?}");
                assert!(d <= Duration::from_millis(p.max_delay_ms));
                prev = d;
            }
        }
    }

    #[test]
    fn delay_escalates_with_failure_history() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_delay(0, 0), Duration::from_millis(45_000));
        assert_eq!(p.backoff_delay(1, 0), Duration::from_millis(67_500));
        assert_eq!(p.backoff_delay(0, 6), Duration::from_millis(90_000));
        assert_eq!(p.backoff_delay(0, 11), Duration::from_millis(120_000));
        assert_eq!(p.backoff_delay(10, 0), Duration::from_millis(180_000));
    }

    #[test]
    fn huge_attempts_stay_capped() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff_delay(u32::MAX, 0), Duration::from_millis(p.max_delay_ms));
    }

    #[test]
    fn retries_shrink_for_bad_links() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_retries(0), 5);
        assert_eq!(p.max_retries(20), 5);
        assert_eq!(p.max_retries(21), 2);
    }

    #[test]
    fn cooldown_grows_for_bad_links() {
        let p = RetryPolicy::default();
        assert_eq!(p.cooldown_duration(3), Duration::from_secs(120));
        assert_eq!(p.cooldown_duration(11), Duration::from_secs(300));
    }

    #[test]
    fn validate_rejects_shrinking_multiplier() {
        let p = RetryPolicy { multiplier: 0.5, ..Default::default() };
        assert!(p.validate().is_err());
        let p = RetryPolicy { multiplier: f64::NAN, ..Default::default() };
        assert!(p.validate().is_err());
        assert!(RetryPolicy::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let p: RetryPolicy = serde_json::from_str(r#"{"max_retries": 3, "base_delay_ms": 1000}"#).unwrap();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.base_delay_ms, 1000);
        assert_eq!(p.max_delay_ms, 180_000);
    }
}
