//! Log-flood suppression for noisy links.
//!
//! A flaky exchange can report hundreds of errors a minute. [`LogThrottle`]
//! counts every occurrence but only lets a few through: the first `burst`,
//! every `every_nth`, and the first one after `window_ms` of silence.

use serde::{Deserialize, Serialize};

/// Throttle tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Occurrences always logged at the start.
    pub burst: u64,
    /// Log every Nth occurrence. `0` disables.
    pub every_nth: u64,
    /// Log again once this much time has passed since the last logged one.
    pub window_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { burst: 3, every_nth: 50, window_ms: 120_000 }
    }
}

/// Counter plus time window deciding whether an occurrence is logged.
#[derive(Debug, Clone)]
pub struct LogThrottle {
    config: ThrottleConfig,
    count: u64,
    last_logged_ms: Option<u64>,
}

impl LogThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { config, count: 0, last_logged_ms: None }
    }

    /// At most one logged occurrence per window.
    pub fn windowed(window_ms: u64) -> Self {
        Self::new(ThrottleConfig { burst: 0, every_nth: 0, window_ms })
    }

    /// Record one occurrence at `now_ms`; returns whether to log it.
    pub fn should_log(&mut self, now_ms: u64) -> bool {
        let n = self.count;
        self.count += 1;

        let window_elapsed = match self.last_logged_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.config.window_ms,
        };
        let nth = self.config.every_nth > 0 && n % self.config.every_nth == 0;
        let log = n < self.config.burst || nth || window_elapsed;

        if log {
            self.last_logged_ms = Some(now_ms);
        }
        log
    }

    /// Total occurrences recorded, logged or not.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.last_logged_ms = None;
    }
}
