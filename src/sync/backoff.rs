use rand::Rng;

use crate::config::SyncConfig;

/// Exponential backoff with multiplicative jitter.
///
/// `delay(n) = min(base * 2^(n-1), max) * j`, where `j` is drawn uniformly
/// from `[jitter_min, jitter_max]`, and the result is capped at `max` again.
/// With both jitter bounds at `1.0` the curve is deterministic.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            jitter_min: 1.0,
            jitter_max: 1.0,
        }
    }

    pub fn with_jitter(mut self, jitter_min: f64, jitter_max: f64) -> Self {
        self.jitter_min = jitter_min;
        self.jitter_max = jitter_max;
        self
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.base_backoff_ms, config.max_backoff_ms)
            .with_jitter(config.jitter_min, config.jitter_max)
    }

    /// Delay before the next try, given the number of attempts made so far.
    /// Attempt 0 is treated as the first attempt.
    pub fn delay_ms(&self, attempt_count: u32) -> u64 {
        let capped = self.base_delay_ms(attempt_count);
        let jittered = (capped as f64 * self.jitter_factor()).round();
        if jittered.is_finite() && jittered >= 0.0 {
            (jittered as u64).min(self.max_delay_ms)
        } else {
            capped
        }
    }

    /// The un-jittered curve value for `attempt_count`.
    pub fn base_delay_ms(&self, attempt_count: u32) -> u64 {
        let exponent = attempt_count.max(1) - 1;
        let multiplier = 2_u64.checked_pow(exponent).unwrap_or(u64::MAX);
        self.base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms)
    }

    fn jitter_factor(&self) -> f64 {
        if self.jitter_min >= self.jitter_max {
            return self.jitter_min;
        }
        rand::rng().random_range(self.jitter_min..=self.jitter_max)
    }
}
