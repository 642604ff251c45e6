use std::time::Duration;

use tokio_retry::strategy::{jitter, ExponentialBackoff};

/// Bounded in-cycle retry of transient failures.
#[derive(clap::Parser, Clone, Copy, Debug)]
pub struct RetryPolicy {
    #[clap(
        long = "retry-max-attempts",
        env = "RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        help = "Attempts per cycle before a transient error is given up on"
    )]
    pub max_attempts: usize,

    #[clap(
        long = "retry-initial-delay-ms",
        env = "RETRY_INITIAL_DELAY_MS",
        default_value_t = 2_000
    )]
    pub initial_delay_ms: u64,

    #[clap(
        long = "retry-max-delay-ms",
        env = "RETRY_MAX_DELAY_MS",
        default_value_t = 30_000
    )]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: usize,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
        }
    }

    /// Delays between attempts, without jitter. The first attempt is not
    /// delayed, so there are `max_attempts - 1` entries.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + Clone {
        // ExponentialBackoff yields factor * 2^n, starting at n = 1
        let factor = (self.initial_delay_ms / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .take(self.max_attempts.saturating_sub(1))
    }

    pub fn strategy(&self) -> impl Iterator<Item = Duration> + Clone {
        self.delays().map(jitter)
    }
}
