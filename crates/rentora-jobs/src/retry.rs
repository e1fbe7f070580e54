//! Retry backoff.

use rand::Rng;
use rentora_config::JobsConfig;
use std::time::Duration;

/// Exponential backoff: `base × 2^attempts`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Adds up to 10% random jitter on top of the computed delay.
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: false,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay before the next run of a job that has failed `attempts` times.
    pub fn delay_for_attempt(&self, attempts: u32) -> Duration {
        let factor = 2u32.checked_pow(attempts).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if self.jitter && !delay.is_zero() {
            let extra = rand::thread_rng().gen_range(0.0..0.1);
            delay.mul_f64(1.0 + extra).min(self.max_delay)
        } else {
            delay
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3600))
    }
}

impl From<&JobsConfig> for RetryPolicy {
    fn from(config: &JobsConfig) -> Self {
        Self {
            base_delay: config.retry_base_delay(),
            max_delay: config.retry_max_delay(),
            jitter: config.retry_jitter,
        }
    }
}
