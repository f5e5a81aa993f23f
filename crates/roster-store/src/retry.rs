use std::time::Duration;

use roster_core::config::DatabaseConfig;

/// Bounded retry: how many times a statement is attempted and how long to
/// wait between attempts. The delay grows linearly (`backoff * attempt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// No delay between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        )
    }

    /// Delay before the attempt following `failed_attempt` (1-based).
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        self.backoff * failed_attempt
    }

    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            roster_core::config::DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(roster_core::config::DEFAULT_RETRY_BACKOFF_MS),
        )
    }
}
