//! Retry policy and exponential backoff delays

use std::time::Duration;

/// Timeout and retry budget for one logical command invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Hard timeout applied to each attempt
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(20_000),
            max_retries: 3,
            base_delay: Duration::from_millis(2_000),
            max_delay: Duration::from_millis(20_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first one
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// `min(base_delay * multiplier^(attempt - 1), max_delay)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_ms = self.base_delay.as_millis() as f64;
        let calculated = base_ms * self.backoff_multiplier.powi(exponent);
        let capped = calculated.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delays between consecutive attempts for a persistently failing command
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.total_attempts()).map(|attempt| self.delay_for_attempt(attempt))
    }
}
