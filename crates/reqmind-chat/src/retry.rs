//! Bounded retry for models that are still loading.

use std::time::Duration;

/// Exponential backoff settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    /// Upper bound for any single wait, including server estimates.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(2000),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (0-based).
    ///
    /// A server estimate wins over the policy delay. Both are capped at `max_delay`, and
    /// out-of-range values never panic.
    pub fn delay_for(&self, retry: u32, estimated_secs: Option<f64>) -> Duration {
        let secs = match estimated_secs {
            Some(secs) if secs.is_finite() && secs >= 0.0 => secs,
            _ => {
                let exponent = retry.min(i32::MAX as u32) as i32;
                self.initial_delay.as_secs_f64() * self.backoff_factor.max(1.0).powi(exponent)
            }
        };
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
