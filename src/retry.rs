// Bounded exponential backoff for rate-limited API calls.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Retry settings as read from the `retry` section of the config file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Decides how long to wait between attempts of a rate-limited call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Total attempts allowed, including the first. Never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.config.max_delay_ms)
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms =
            (self.config.base_delay_ms as f64) * self.config.backoff_multiplier.powi(exponent);

        let jittered_ms = if self.config.jitter {
            delay_ms * rand::thread_rng().gen_range(0.5..=1.5)
        } else {
            delay_ms
        };

        // cap last so jitter never exceeds max_delay
        Duration::from_millis(jittered_ms.min(self.config.max_delay_ms as f64) as u64)
    }

    /// Server-provided `Retry-After` wins over the computed delay, capped.
    pub fn delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_delay()),
            None => self.delay_for(attempt),
        }
    }
}
