//! Sliding-window rate limiter with exponential backoff.
//!
//! One limiter is shared by every caller of a tier (by default by every tier):
//! the budget protects a single outbound identity, not individual symbols.
//!
//! Admission, in order:
//! 1. If a backoff is active, wait until it expires.
//! 2. If the window already holds `max_requests` admissions, wait until the
//!    oldest one ages out.
//! 3. Reserve a slot and sleep a random jitter in `[min_delay, max_delay]`.
//!
//! A 429 from any provider calls [`RateLimiter::record_429_error`], which arms a
//! backoff of `min(max_backoff, base_backoff * 2^n)`.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::retry::sleep_or_cancel;
use crate::errors::MarketDataError;

/// Rate limiter configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum admissions per `time_window`.
    pub max_requests: usize,
    /// Length of the sliding window.
    pub time_window: Duration,
    /// Lower bound of the per-request jitter.
    pub min_delay: Duration,
    /// Upper bound of the per-request jitter.
    pub max_delay: Duration,
    /// Backoff after the first 429.
    pub base_backoff: Duration,
    /// Cap on any single backoff.
    pub max_backoff: Duration,
    /// A 429 arriving longer than this after the previous one starts over at `base_backoff`.
    pub reset_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            time_window: Duration::from_secs(60),
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
            base_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(600),
            reset_window: Duration::from_secs(3600),
        }
    }
}

/// Backoff bookkeeping, created by the first 429.
#[derive(Debug, Default)]
struct BackoffState {
    consecutive_failures: u32,
    backoff_until: Option<Instant>,
    last_signal: Option<Instant>,
}

#[derive(Debug, Default)]
struct LimiterState {
    /// Admission timestamps inside the trailing window.
    window: VecDeque<Instant>,
    backoff: BackoffState,
}

impl LimiterState {
    fn prune(&mut self, now: Instant, time_window: Duration) {
        self.window
            .retain(|admitted| now.saturating_duration_since(*admitted) < time_window);
    }
}

/// Point-in-time view of the limiter, for stats endpoints.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterSnapshot {
    pub in_backoff: bool,
    pub consecutive_failures: u32,
    pub backoff_remaining_secs: f64,
    pub requests_in_window: usize,
}

enum Admission {
    Wait(Duration),
    Admitted(Duration),
}

/// Process-wide admission control for upstream calls.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Lock the state mutex, recovering from poison if necessary.
    ///
    /// The worst case after a poisoned lock is slightly wrong pacing,
    /// which beats panicking every caller.
    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn jitter(&self) -> Duration {
        let (min, max) = (self.config.min_delay, self.config.max_delay);
        if max <= min {
            return min;
        }
        let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Blocks until the caller may issue one upstream request.
    ///
    /// Must be awaited immediately before every outbound call. Returns
    /// `Err(Cancelled)` if `cancel` fires while waiting.
    pub async fn wait_if_needed(&self, cancel: &CancellationToken) -> Result<(), MarketDataError> {
        loop {
            let admission = {
                let mut state = self.lock_state();
                let now = Instant::now();

                match state.backoff.backoff_until {
                    Some(until) if now < until => Admission::Wait(until - now),
                    _ => {
                        state.prune(now, self.config.time_window);

                        if state.window.len() >= self.config.max_requests {
                            let oldest = state.window.iter().min().copied().unwrap_or(now);
                            Admission::Wait(
                                (oldest + self.config.time_window).saturating_duration_since(now),
                            )
                        } else {
                            let jitter = self.jitter();
                            state.window.push_back(now + jitter);
                            Admission::Admitted(jitter)
                        }
                    }
                }
            };

            match admission {
                Admission::Wait(wait) => {
                    debug!("Rate limiter: waiting {:?} before next request", wait);
                    sleep_or_cancel(wait, cancel).await?;
                }
                Admission::Admitted(jitter) => {
                    sleep_or_cancel(jitter, cancel).await?;
                    return Ok(());
                }
            }
        }
    }

    /// Records an explicit throttling signal and arms the backoff.
    ///
    /// Returns the backoff that was applied.
    pub fn record_429_error(&self) -> Duration {
        let mut state = self.lock_state();
        let now = Instant::now();
        let backoff = &mut state.backoff;

        if let Some(last) = backoff.last_signal {
            if now.saturating_duration_since(last) >= self.config.reset_window {
                backoff.consecutive_failures = 0;
            }
        }

        let delay = 2u32
            .checked_pow(backoff.consecutive_failures)
            .and_then(|factor| self.config.base_backoff.checked_mul(factor))
            .map_or(self.config.max_backoff, |d| d.min(self.config.max_backoff));

        backoff.backoff_until = Some(now + delay);
        backoff.last_signal = Some(now);
        backoff.consecutive_failures = backoff.consecutive_failures.saturating_add(1);

        info!(
            "Rate limit signal #{}; backing off for {:?}",
            backoff.consecutive_failures, delay
        );
        delay
    }

    /// Time left on the current backoff, if any.
    pub fn backoff_remaining(&self) -> Option<Duration> {
        let state = self.lock_state();
        let now = Instant::now();
        state
            .backoff
            .backoff_until
            .filter(|until| now < *until)
            .map(|until| until - now)
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let mut state = self.lock_state();
        let now = Instant::now();
        state.prune(now, self.config.time_window);
        let remaining = state
            .backoff
            .backoff_until
            .filter(|until| now < *until)
            .map(|until| until - now);

        RateLimiterSnapshot {
            in_backoff: remaining.is_some(),
            consecutive_failures: state.backoff.consecutive_failures,
            backoff_remaining_secs: remaining.map_or(0.0, |d| d.as_secs_f64()),
            requests_in_window: state.window.len(),
        }
    }

    /// Clears the window and any backoff.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        *state = LimiterState::default();
        debug!("Rate limiter reset");
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
