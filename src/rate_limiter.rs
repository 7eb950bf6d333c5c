//! Request pacing for the classification endpoint
//!
//! The endpoint is budgeted in requests per minute. This module keeps a sliding
//! 60 second window of dispatch times and:
//! - Honors an active cooldown pause before anything else
//! - Blocks while the per-minute cap is reached
//! - Enforces a minimum gap between consecutive requests
//!
//! State is owned by a single batch and reset when the batch starts, so the
//! limiter takes `&mut self` and needs no locking.

use crate::config::Config;
use crate::models::{ProgressCallback, ProgressEvent};
use crate::template::{format_duration, format_template};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

/// Width of the sliding request window
pub const WINDOW: Duration = Duration::from_secs(60);

/// Pacing state for one batch run
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    pub last_request: Option<Instant>,
    /// Dispatch times, oldest first
    pub request_history: VecDeque<Instant>,
    pub consecutive_failures: u32,
    pub is_paused: bool,
    pub pause_until: Option<Instant>,
}

pub struct RateLimiter {
    state: RateLimitState,
    requests_per_minute: u32,
    min_delay: Duration,
    poll_interval: Duration,
    wait_template: String,
    progress: Option<ProgressCallback>,
}

impl RateLimiter {
    pub fn new(config: &Config) -> Self {
        let poll_ms = config.progress.poll_interval_ms.max(1);
        Self {
            state: RateLimitState::default(),
            requests_per_minute: config.rate_limiting.requests_per_minute,
            min_delay: Duration::from_millis(config.rate_limiting.min_delay_between_requests_ms),
            poll_interval: Duration::from_millis(poll_ms),
            wait_template: config.progress.wait_template.clone(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn set_progress(&mut self, progress: Option<ProgressCallback>) {
        self.progress = progress;
    }

    /// Clear all pacing state; called once at the start of every batch
    pub fn reset(&mut self) {
        self.state = RateLimitState::default();
    }

    pub fn state(&self) -> &RateLimitState {
        &self.state
    }

    /// Remaining pause time, if a cooldown is in effect
    pub fn pause_remaining(&self) -> Option<Duration> {
        if !self.state.is_paused {
            return None;
        }
        let until = self.state.pause_until?;
        let now = Instant::now();
        if now < until {
            Some(until - now)
        } else {
            None
        }
    }

    /// Wait until a request may be dispatched
    ///
    /// Does not record anything, so calling it twice without a dispatch in between
    /// only waits once.
    pub async fn wait_for_slot(&mut self) {
        if let Some(remaining) = self.pause_remaining() {
            debug!("Cooldown active, waiting {:?}", remaining);
            self.wait_with_progress(remaining, "Cooldown").await;
        }
        if self.state.is_paused {
            self.state.is_paused = false;
            self.state.pause_until = None;
        }

        self.prune_history();

        if self.requests_per_minute > 0 {
            while self.state.request_history.len() >= self.requests_per_minute as usize {
                let Some(&oldest) = self.state.request_history.front() else {
                    break;
                };
                let free_at = oldest + WINDOW;
                let now = Instant::now();
                if free_at > now {
                    debug!(
                        "Request cap of {}/min reached, waiting {:?}",
                        self.requests_per_minute,
                        free_at - now
                    );
                    self.wait_with_progress(free_at - now, "Rate limit").await;
                }
                self.prune_history();
            }
        }

        if let Some(last) = self.state.last_request {
            let since_last = Instant::now().saturating_duration_since(last);
            if since_last < self.min_delay {
                let remaining = self.min_delay - since_last;
                trace!("Spacing requests, sleeping {:?}", remaining);
                sleep(remaining).await;
            }
        }
    }

    /// Record a dispatch; every attempt counts, successful or not
    pub fn record_attempt(&mut self) {
        let now = Instant::now();
        self.state.request_history.push_back(now);
        self.state.last_request = Some(now);
    }

    pub fn record_success(&mut self) {
        self.state.consecutive_failures = 0;
    }

    /// Count a failed attempt and return the new streak length
    pub fn record_failure(&mut self) -> u32 {
        self.state.consecutive_failures += 1;
        self.state.consecutive_failures
    }

    pub fn reset_failures(&mut self) {
        self.state.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.consecutive_failures
    }

    /// Enter a cooldown and wait it out
    pub async fn pause_for(&mut self, duration: Duration, reason: &str) {
        self.state.is_paused = true;
        self.state.pause_until = Some(Instant::now() + duration);
        self.wait_with_progress(duration, reason).await;
        self.state.is_paused = false;
        self.state.pause_until = None;
    }

    /// Sleep for `duration`, reporting the countdown through the progress sink
    pub async fn wait_with_progress(&self, duration: Duration, reason: &str) {
        let end = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if now >= end {
                break;
            }
            let remaining = end - now;

            if let Some(progress) = &self.progress {
                let text = format_template(
                    &self.wait_template,
                    &[("{REASON}", reason), ("{TIME}", &format_duration(remaining))],
                );
                progress(ProgressEvent::waiting(text));
            }

            sleep(remaining.min(self.poll_interval)).await;
        }
    }

    fn prune_history(&mut self) {
        let now = Instant::now();
        while let Some(&front) = self.state.request_history.front() {
            if now.saturating_duration_since(front) >= WINDOW {
                self.state.request_history.pop_front();
            } else {
                break;
            }
        }
    }
}
