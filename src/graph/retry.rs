// SPDX-License-Identifier: MIT

//! Retry policy with bounded exponential backoff

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a failing node is re-invoked and how long to wait in between.
///
/// `delay = backoff_base * backoff_factor^(attempt - 1)`, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one (0 is treated as 1)
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds
    pub backoff_base_ms: u64,
    /// Multiplier applied per further attempt
    pub backoff_factor: f64,
    /// Upper bound on any single delay, in milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 200,
            backoff_factor: 2.0,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Single attempt, never retried
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base_ms = base.as_millis() as u64;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff_ms = max.as_millis() as u64;
        self
    }

    /// Whether another attempt is allowed after `attempts_made` failures
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts.max(1)
    }

    /// Delay to wait after the `attempt`-th failure (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let factor = if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            1.0
        };
        let millis = (self.backoff_base_ms as f64) * factor.powi(exponent);
        let capped = millis.min(self.max_backoff_ms as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }
}
