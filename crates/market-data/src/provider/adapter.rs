//! One fallback tier: a provider wrapped in pacing, identity rotation and retry.
//!
//! For each query variant, in order, every attempt:
//! 1. awaits [`RateLimiter::wait_if_needed`],
//! 2. picks a User-Agent,
//! 3. performs one network call, bounded by the request timeout and the
//!    caller's cancellation token.
//!
//! Transient failures (429, timeouts, connection errors) go back through the
//! [`RetryHandler`]. A 429 also arms the shared limiter's backoff, so the next
//! attempt waits it out. Empty or malformed answers are settled without retry
//! and the next variant is tried. A tier never raises for ordinary data
//! failures; it returns `None` (EMPTY).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::traits::{SeriesProvider, SeriesRequest};
use super::user_agent::UserAgentRotator;
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{DateWindow, OhlcvBar, ProviderSymbol, SeriesOrigin, StockProfile, TimeSeries};
use crate::registry::{BarValidator, ProviderStats, RateLimiter, RetryHandler, TierCounters};

/// Outcome of one call: `Err` is retried, `Ok(Err)` is settled.
type Settled<T> = Result<Result<T, MarketDataError>, MarketDataError>;

pub struct ProviderAdapter {
    provider: Arc<dyn SeriesProvider>,
    limiter: Arc<RateLimiter>,
    user_agents: Arc<UserAgentRotator>,
    retry: Arc<RetryHandler>,
    validator: BarValidator,
    timeout: Duration,
    counters: TierCounters,
}

impl ProviderAdapter {
    pub fn new(
        provider: Arc<dyn SeriesProvider>,
        limiter: Arc<RateLimiter>,
        user_agents: Arc<UserAgentRotator>,
        retry: Arc<RetryHandler>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            limiter,
            user_agents,
            retry,
            validator: BarValidator::new(),
            timeout,
            counters: TierCounters::default(),
        }
    }

    pub fn with_validator(mut self, validator: BarValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn id(&self) -> &'static str {
        self.provider.id()
    }

    pub fn priority(&self) -> u8 {
        self.provider.priority()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn stats(&self) -> ProviderStats {
        self.counters.snapshot(self.id())
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    /// Fetch `window.lookback_days` bars for a normalized symbol.
    ///
    /// Returns `Ok(None)` when this tier cannot serve the symbol and
    /// `Err(Cancelled)` only when `cancel` fired.
    pub async fn fetch(
        &self,
        symbol: &str,
        window: DateWindow,
        cancel: &CancellationToken,
    ) -> Result<Option<TimeSeries>, MarketDataError> {
        let provider_id = self.id();

        for variant in self.provider.variants(symbol) {
            let variant = &variant;

            let result = self
                .retry
                .execute_with_retry(cancel, |attempt| async move {
                    debug!(
                        provider = provider_id,
                        variant = %variant,
                        attempt = attempt + 1,
                        "Requesting daily bars"
                    );
                    let result = self
                        .gated_call(cancel, |user_agent| async move {
                            let request = SeriesRequest {
                                symbol,
                                variant,
                                window,
                                user_agent,
                                timeout: self.timeout,
                            };
                            self.provider.fetch_bars(&request).await
                        })
                        .await
                        .and_then(|bars| {
                            if bars.is_empty() {
                                Err(MarketDataError::NoData {
                                    provider: provider_id.to_string(),
                                    symbol: variant.to_string(),
                                })
                            } else {
                                Ok(bars)
                            }
                        });
                    self.settle(variant, result, true)
                })
                .await;

            match result {
                Ok(Ok(bars)) => match self.normalize(symbol, variant, window, bars) {
                    Some(series) => {
                        self.counters.record_success(variant);
                        info!(
                            provider = provider_id,
                            variant = %variant,
                            bars = series.len(),
                            "Fetched daily bars"
                        );
                        return Ok(Some(series));
                    }
                    None => {
                        self.counters.record_other_error();
                        continue;
                    }
                },
                Ok(Err(err)) if err.retry_class() == RetryClass::NextProvider => {
                    warn!(provider = provider_id, variant = %variant, "Tier unavailable: {}", err);
                    return Ok(None);
                }
                Ok(Err(err)) => {
                    debug!(provider = provider_id, variant = %variant, "Trying next variant: {}", err);
                }
                Err(MarketDataError::Cancelled) => return Err(MarketDataError::Cancelled),
                Err(err) if err.is_rate_limited() => {
                    warn!(
                        provider = provider_id,
                        variant = %variant,
                        "Still rate limited after retries, abandoning tier"
                    );
                    return Ok(None);
                }
                Err(err) => {
                    warn!(provider = provider_id, variant = %variant, "Retries exhausted: {}", err);
                }
            }
        }

        Ok(None)
    }

    /// Best-effort profile lookup: one gated attempt per variant, no retry.
    pub async fn fetch_profile(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<StockProfile>, MarketDataError> {
        let window = DateWindow::for_lookback(0, chrono::Utc::now().date_naive());

        for variant in self.provider.variants(symbol) {
            let variant = &variant;
            let result = self
                .gated_call(cancel, |user_agent| async move {
                    let request = SeriesRequest {
                        symbol,
                        variant,
                        window,
                        user_agent,
                        timeout: self.timeout,
                    };
                    self.provider.fetch_profile(&request).await
                })
                .await;

            match self.settle(variant, result, false) {
                Ok(Ok(mut profile)) => {
                    profile.symbol = symbol.to_string();
                    profile.source.get_or_insert_with(|| self.id().to_string());
                    return Ok(Some(profile));
                }
                Ok(Err(err)) if err.retry_class() == RetryClass::NextProvider => return Ok(None),
                Ok(Err(_)) => continue,
                Err(MarketDataError::Cancelled) => return Err(MarketDataError::Cancelled),
                Err(err) if err.is_rate_limited() => return Ok(None),
                Err(_) => continue,
            }
        }

        Ok(None)
    }

    /// Waits for admission, then runs one call raced against timeout and cancellation.
    async fn gated_call<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        make_call: F,
    ) -> Result<T, MarketDataError>
    where
        F: FnOnce(&'static str) -> Fut,
        Fut: Future<Output = Result<T, MarketDataError>>,
    {
        self.limiter.wait_if_needed(cancel).await?;
        let user_agent = self.user_agents.pick();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MarketDataError::Cancelled),
            result = tokio::time::timeout(self.timeout, make_call(user_agent)) => {
                result.unwrap_or_else(|_| {
                    Err(MarketDataError::Timeout {
                        provider: self.id().to_string(),
                    })
                })
            }
        }
    }

    /// Routes a failure to the retry loop or settles it, updating the limiter.
    fn settle<T>(
        &self,
        variant: &ProviderSymbol,
        result: Result<T, MarketDataError>,
        count: bool,
    ) -> Settled<T> {
        let err = match result {
            Ok(value) => return Ok(Ok(value)),
            Err(err) => err,
        };

        match err.retry_class() {
            RetryClass::WithBackoff => {
                if err.is_rate_limited() {
                    let backoff = self.limiter.record_429_error();
                    if count {
                        self.counters.record_rate_limited();
                    }
                    warn!(
                        provider = self.id(),
                        variant = %variant,
                        backoff_secs = backoff.as_secs_f64(),
                        "Rate limited by upstream"
                    );
                } else {
                    if count {
                        self.counters.record_other_error();
                    }
                    warn!(provider = self.id(), variant = %variant, "Transient failure: {}", err);
                }
                Err(err)
            }
            RetryClass::NextVariant | RetryClass::NextProvider => {
                if count {
                    if matches!(err, MarketDataError::NoData { .. }) {
                        self.counters.record_no_data();
                    } else {
                        self.counters.record_other_error();
                    }
                }
                Ok(Err(err))
            }
            RetryClass::Never => Err(err),
        }
    }

    /// Drops invalid rows, sorts, de-duplicates and trims to the lookback.
    fn normalize(
        &self,
        symbol: &str,
        variant: &ProviderSymbol,
        window: DateWindow,
        bars: Vec<OhlcvBar>,
    ) -> Option<TimeSeries> {
        let (valid, invalid) = self.validator.validate_batch(bars);
        if !invalid.is_empty() {
            warn!(
                provider = self.id(),
                variant = %variant,
                rejected = invalid.len(),
                "Dropped bars failing validation: {}",
                invalid[0].1
            );
        }
        if valid.is_empty() {
            return None;
        }

        let origin = SeriesOrigin::Live {
            provider: self.id().into(),
            variant: variant.clone(),
        };
        Some(TimeSeries::new(symbol, valid, origin).tail(window.lookback_days as usize))
    }
}
