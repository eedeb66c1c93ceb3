//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use log::debug;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::errors::MarketDataError;

/// Sleeps for `duration` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), MarketDataError> {
    if cancel.is_cancelled() {
        return Err(MarketDataError::Cancelled);
    }
    if duration.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MarketDataError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; the operation runs at most `max_retries + 1` times.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    /// Jitter added on top of each delay, as a fraction of it.
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter_ratio: 0.1,
        }
    }
}

/// Runs an operation until it succeeds or the retry budget runs out.
///
/// The handler does not classify errors: whatever the operation returns as
/// `Err` is retried. Callers settle permanent failures inside the operation.
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retry number `attempt + 1`, without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = self
            .config
            .exponential_base
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let secs = (self.config.base_delay.as_secs_f64() * factor)
            .min(self.config.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.config.max_delay)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        if self.config.jitter_ratio <= 0.0 || delay.is_zero() {
            return delay;
        }
        let jitter = delay.as_secs_f64() * self.config.jitter_ratio * rand::thread_rng().gen::<f64>();
        delay + Duration::try_from_secs_f64(jitter).unwrap_or(Duration::ZERO)
    }

    /// Invokes `op(attempt)` up to `max_retries + 1` times.
    ///
    /// Returns the first success, or the last failure once the budget is spent.
    /// Cancellation between attempts returns `Err(Cancelled)`.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, MarketDataError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(MarketDataError::Cancelled);
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(MarketDataError::Cancelled) => return Err(MarketDataError::Cancelled),
                Err(err) if attempt >= self.config.max_retries => {
                    debug!(
                        "Giving up after {} attempt(s): {}",
                        attempt + 1,
                        err
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        "Attempt {} failed ({}); retrying in {:?}",
                        attempt + 1,
                        err,
                        delay
                    );
                    sleep_or_cancel(delay, cancel).await?;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
