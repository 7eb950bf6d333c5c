//! Retry delays and the extended cooldown after repeated failures
//!
//! Each failed classification attempt falls into one of three branches:
//!
//! - **Timeout**: `timeout_base × exponential_base^attempt`
//! - **Generic error**: `error_base × exponential_base^attempt`
//! - **Rate limit**: `base_cooldown + base_cooldown × 2^attempt`, capped at the max cooldown
//!
//! Timeout and generic waits are skipped after the final attempt; a rate-limit
//! cooldown is always served. Independently, once the failure streak reaches the
//! configured threshold, an extended cooldown of
//! `min(base_cooldown × factor, max_cooldown)` is served and the streak is cleared.

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::RetryKind;

/// A wait the retry loop must serve before the next attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryWait {
    pub delay: Duration,
    pub reason: String,
    /// Rate-limit waits put the limiter into its paused state
    pub pause: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub timeout_base_secs: u64,
    pub error_base_secs: u64,
    pub exponential_base: u32,
    pub base_cooldown_secs: u64,
    pub max_cooldown: Duration,
    pub extended_cooldown_factor: u64,
    pub max_consecutive_failures: u32,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout_base_secs: config.timeout_retry_base_secs(),
            error_base_secs: config.error_retry_base_secs(),
            exponential_base: config.retry.backoff.exponential_base.max(1),
            base_cooldown_secs: config.base_cooldown_secs(),
            max_cooldown: config.max_cooldown(),
            extended_cooldown_factor: config.extended_cooldown_factor(),
            max_consecutive_failures: config.rate_limiting.max_consecutive_failures.max(1),
            max_attempts: config.retry.max_attempts.max(1),
        }
    }

    pub fn timeout_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(
            self.timeout_base_secs
                .saturating_mul(pow(self.exponential_base, attempt)),
        )
    }

    pub fn error_delay(&self, attempt: u32) -> Duration {
        Duration::from_secs(
            self.error_base_secs
                .saturating_mul(pow(self.exponential_base, attempt)),
        )
    }

    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let base = self.base_cooldown_secs;
        let secs = base.saturating_add(base.saturating_mul(pow(2, attempt)));
        Duration::from_secs(secs).min(self.max_cooldown)
    }

    pub fn extended_cooldown(&self) -> Duration {
        Duration::from_secs(
            self.base_cooldown_secs
                .saturating_mul(self.extended_cooldown_factor),
        )
        .min(self.max_cooldown)
    }

    /// Wait to serve after a failed attempt (1-based), or `None` to move on
    pub fn plan(&self, kind: RetryKind, attempt: u32) -> Option<RetryWait> {
        let has_next = attempt < self.max_attempts;
        let wait = match kind {
            RetryKind::RateLimit => RetryWait {
                delay: self.rate_limit_delay(attempt),
                reason: format!("Rate limit (attempt {})", attempt),
                pause: true,
            },
            RetryKind::Timeout if has_next => RetryWait {
                delay: self.timeout_delay(attempt),
                reason: format!("Timeout retry {}/{}", attempt + 1, self.max_attempts),
                pause: false,
            },
            RetryKind::Generic if has_next => RetryWait {
                delay: self.error_delay(attempt),
                reason: format!("Error retry {}/{}", attempt + 1, self.max_attempts),
                pause: false,
            },
            _ => return None,
        };

        debug!("Backoff for {:?} on attempt {}: {:?}", kind, attempt, wait.delay);
        Some(wait)
    }

    /// Extended cooldown to serve when the failure streak has reached the threshold
    pub fn extended_cooldown_for(&self, consecutive_failures: u32) -> Option<Duration> {
        if consecutive_failures >= self.max_consecutive_failures {
            let pause = self.extended_cooldown();
            warn!(
                "{} consecutive failures, entering extended cooldown of {:?}",
                consecutive_failures, pause
            );
            Some(pause)
        } else {
            None
        }
    }
}

fn pow(base: u32, exp: u32) -> u64 {
    (base as u64).saturating_pow(exp)
}
