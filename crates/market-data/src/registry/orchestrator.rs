//! Fallback orchestration over the ordered tier list.
//!
//! `fetch(symbol, days)`:
//! 1. Normalize the symbol and look up `(symbol, days)` in the cache.
//! 2. Try each real tier in priority order; the first non-empty series is
//!    cached with the default TTL and returned.
//! 3. If every tier comes back empty, synthesize a reference series, mark it
//!    degraded and cache it with the short degraded TTL.
//! 4. Only when even synthesis has no seed basis, answer `Unavailable`.
//!
//! Ordinary data failures never escape; the only non-data outcome besides
//! `Unavailable` is `Cancelled`, which skips synthesis and leaves the cache untouched.

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Utc};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::rate_limiter::{RateLimitConfig, RateLimiter};
use super::retry::{RetryConfig, RetryHandler};
use super::stats::{FetchCounters, FetchStats};
use super::validator::{BarValidator, ValidatorConfig};
use crate::cache::{CacheStats, SeriesCache};
use crate::config::{MarketDataConfig, UserAgentStrategy};
use crate::errors::MarketDataError;
use crate::models::{
    is_well_formed_symbol, normalize_symbol, DateWindow, FetchKey, FetchOutcome, StockProfile,
    MAX_LOOKBACK_DAYS,
};
use crate::provider::finmind::FinMindProvider;
use crate::provider::yahoo::YahooProvider;
use crate::provider::{ProviderAdapter, SeriesProvider, UserAgentRotator};
use crate::synthetic::{self, SyntheticSeriesGenerator};

/// Seconds east of UTC for the Taipei trading calendar.
const TAIPEI_OFFSET_SECS: i32 = 8 * 3600;

/// Ordered tiers plus cache and synthetic fallback.
///
/// Construct once at process start and share behind an `Arc`.
pub struct FallbackOrchestrator {
    tiers: Vec<ProviderAdapter>,
    cache: Option<SeriesCache>,
    default_ttl: Duration,
    degraded_ttl: Duration,
    synthetic: Option<SyntheticSeriesGenerator>,
    limiter: Arc<RateLimiter>,
    counters: FetchCounters,
}

impl FallbackOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Builds the Yahoo and FinMind tiers described by `config`.
    pub fn from_config(config: &MarketDataConfig) -> Result<Self, MarketDataError> {
        config.validate()?;
        let timeout = config.request_timeout();

        let mut builder = Self::builder()
            .rate_limit(config.rate_limit_config())
            .retry(config.retry_config())
            .user_agents(config.providers.user_agent_strategy)
            .request_timeout(timeout)
            .validation(config.validator_config())
            .cache(config.cache.enabled, config.default_ttl(), config.degraded_ttl())
            .synthetic(config.synthetic.enabled);

        if config.providers.yahoo_enabled {
            builder = builder.provider(Arc::new(YahooProvider::new(timeout)?));
        }
        if config.providers.finmind_enabled {
            let token = config.providers.finmind_token.clone();
            builder = builder.provider(Arc::new(FinMindProvider::new(timeout, token)?));
        }

        Ok(builder.build())
    }

    /// Ids of the real tiers in the order they are tried.
    pub fn tier_ids(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|tier| tier.id()).collect()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetch the last `days` daily bars for `symbol`.
    pub async fn fetch(&self, symbol: &str, days: u32) -> FetchOutcome {
        self.fetch_with_cancel(symbol, days, &CancellationToken::new())
            .await
    }

    /// Like [`fetch`](Self::fetch), abandoning the work when `cancel` fires.
    pub async fn fetch_with_cancel(
        &self,
        symbol: &str,
        days: u32,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        FetchCounters::bump(&self.counters.requests);

        let symbol = normalize_symbol(symbol);
        if days == 0 || days > MAX_LOOKBACK_DAYS || !is_well_formed_symbol(&symbol) {
            warn!("Rejecting fetch for {:?} ({} days)", symbol, days);
            FetchCounters::bump(&self.counters.unavailable);
            return FetchOutcome::Unavailable;
        }

        let key = FetchKey::new(&symbol, days);
        if let Some(series) = self.cache.as_ref().and_then(|cache| cache.get(&key)) {
            debug!("Cache hit for {}", key);
            FetchCounters::bump(&self.counters.cache_hits);
            return FetchOutcome::from_series(series);
        }

        let window = DateWindow::for_lookback(days, taipei_today());

        for tier in &self.tiers {
            if cancel.is_cancelled() {
                return self.cancelled(&key);
            }

            match tier.fetch(&symbol, window, cancel).await {
                Ok(Some(series)) => {
                    let series = Arc::new(series);
                    if let Some(cache) = &self.cache {
                        cache.set(key, Arc::clone(&series), self.default_ttl);
                    }
                    return FetchOutcome::Live(series);
                }
                Ok(None) => {
                    debug!("Tier {} had nothing for {}", tier.id(), key);
                }
                Err(MarketDataError::Cancelled) => return self.cancelled(&key),
                Err(err) => {
                    warn!("Tier {} failed for {}: {}", tier.id(), key, err);
                }
            }
        }

        if cancel.is_cancelled() {
            return self.cancelled(&key);
        }

        let synthesized = self
            .synthetic
            .as_ref()
            .and_then(|generator| generator.generate(&symbol, days, window.end));

        match synthesized {
            Some(series) => {
                warn!(
                    "All providers failed for {}; serving {} synthetic bars",
                    key,
                    series.len()
                );
                FetchCounters::bump(&self.counters.degraded);
                let series = Arc::new(series);
                if let Some(cache) = &self.cache {
                    cache.set(key, Arc::clone(&series), self.degraded_ttl);
                }
                FetchOutcome::Degraded(series)
            }
            None => {
                warn!("No data available for {}", key);
                FetchCounters::bump(&self.counters.unavailable);
                FetchOutcome::Unavailable
            }
        }
    }

    fn cancelled(&self, key: &FetchKey) -> FetchOutcome {
        info!("Fetch for {} cancelled", key);
        FetchCounters::bump(&self.counters.cancelled);
        FetchOutcome::Cancelled
    }

    /// Descriptive data for `symbol`.
    ///
    /// Falls back to the reference table (name only, `degraded = true`) when
    /// no tier answers. Returns `None` for malformed symbols or on cancellation.
    pub async fn fetch_profile(
        &self,
        symbol: &str,
        cancel: &CancellationToken,
    ) -> Option<StockProfile> {
        let symbol = normalize_symbol(symbol);
        if !is_well_formed_symbol(&symbol) {
            return None;
        }

        for tier in &self.tiers {
            match tier.fetch_profile(&symbol, cancel).await {
                Ok(Some(profile)) => return Some(profile),
                Ok(None) => continue,
                Err(MarketDataError::Cancelled) => return None,
                Err(err) => {
                    warn!("Profile lookup on {} failed for {}: {}", tier.id(), symbol, err);
                }
            }
        }

        let name = synthetic::lookup(&symbol).map(|stock| stock.name.to_string());
        debug!("Serving fallback profile for {}", symbol);
        Some(StockProfile::fallback(symbol, name))
    }

    pub fn get_stats(&self) -> FetchStats {
        let tiers = self.tiers.iter().map(ProviderAdapter::stats).collect();
        let cached_items = self.cache.as_ref().map_or(0, SeriesCache::len);
        FetchStats::new(&self.counters, tiers, cached_items, self.limiter.snapshot())
    }

    /// Zeroes every counter. Cache and limiter state are kept.
    pub fn reset_stats(&self) {
        self.counters.reset();
        for tier in &self.tiers {
            tier.reset_stats();
        }
    }

    /// Drops the cached entry for `(symbol, days)`.
    pub fn invalidate(&self, symbol: &str, days: u32) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.delete(&FetchKey::new(symbol, days)))
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Evicts expired entries; returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.cache.as_ref().map_or(0, SeriesCache::cleanup_expired)
    }

    /// `None` when caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(SeriesCache::get_stats)
    }
}

fn taipei_today() -> NaiveDate {
    match FixedOffset::east_opt(TAIPEI_OFFSET_SECS) {
        Some(offset) => Utc::now().with_timezone(&offset).date_naive(),
        None => Utc::now().date_naive(),
    }
}

struct PendingTier {
    provider: Arc<dyn SeriesProvider>,
    limiter: Option<Arc<RateLimiter>>,
}

/// Assembles a [`FallbackOrchestrator`].
///
/// Every tier shares one rate limiter unless it is registered with
/// [`provider_with_limiter`](Self::provider_with_limiter).
pub struct OrchestratorBuilder {
    rate_limit: RateLimitConfig,
    limiter: Option<Arc<RateLimiter>>,
    retry: RetryConfig,
    user_agents: UserAgentStrategy,
    request_timeout: Duration,
    validation: ValidatorConfig,
    cache_enabled: bool,
    default_ttl: Duration,
    degraded_ttl: Duration,
    synthetic: bool,
    tiers: Vec<PendingTier>,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            limiter: None,
            retry: RetryConfig::default(),
            user_agents: UserAgentStrategy::default(),
            request_timeout: Duration::from_secs(10),
            validation: ValidatorConfig::default(),
            cache_enabled: true,
            default_ttl: Duration::from_secs(300),
            degraded_ttl: Duration::from_secs(60),
            synthetic: true,
            tiers: Vec::new(),
        }
    }
}

impl OrchestratorBuilder {
    /// Configuration for the shared limiter built at [`build`](Self::build).
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Use an existing shared limiter instead of building one.
    pub fn shared_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn user_agents(mut self, strategy: UserAgentStrategy) -> Self {
        self.user_agents = strategy;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Bar checks every tier applies.
    pub fn validation(mut self, config: ValidatorConfig) -> Self {
        self.validation = config;
        self
    }

    pub fn cache(mut self, enabled: bool, default_ttl: Duration, degraded_ttl: Duration) -> Self {
        self.cache_enabled = enabled;
        self.default_ttl = default_ttl;
        self.degraded_ttl = degraded_ttl;
        self
    }

    pub fn synthetic(mut self, enabled: bool) -> Self {
        self.synthetic = enabled;
        self
    }

    /// Adds a tier gated by the shared limiter.
    pub fn provider(mut self, provider: Arc<dyn SeriesProvider>) -> Self {
        self.tiers.push(PendingTier {
            provider,
            limiter: None,
        });
        self
    }

    /// Adds a tier with its own admission budget.
    pub fn provider_with_limiter(
        mut self,
        provider: Arc<dyn SeriesProvider>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        self.tiers.push(PendingTier {
            provider,
            limiter: Some(limiter),
        });
        self
    }

    pub fn build(self) -> FallbackOrchestrator {
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(self.rate_limit)));
        let user_agents = Arc::new(UserAgentRotator::new(self.user_agents));
        let retry = Arc::new(RetryHandler::new(self.retry));

        let mut tiers: Vec<ProviderAdapter> = self
            .tiers
            .into_iter()
            .map(|pending| {
                let tier_limiter = pending.limiter.unwrap_or_else(|| Arc::clone(&limiter));
                ProviderAdapter::new(
                    pending.provider,
                    tier_limiter,
                    Arc::clone(&user_agents),
                    Arc::clone(&retry),
                    self.request_timeout,
                )
                .with_validator(BarValidator::with_config(self.validation.clone()))
            })
            .collect();
        // Stable, so equal priorities keep registration order.
        tiers.sort_by_key(ProviderAdapter::priority);

        info!(
            "Market data tiers: [{}], synthetic fallback {}",
            tiers
                .iter()
                .map(|tier| tier.id())
                .collect::<Vec<_>>()
                .join(", "),
            if self.synthetic { "on" } else { "off" }
        );

        FallbackOrchestrator {
            tiers,
            cache: self
                .cache_enabled
                .then(|| SeriesCache::new(self.default_ttl)),
            default_ttl: self.default_ttl,
            degraded_ttl: self.degraded_ttl,
            synthetic: self.synthetic.then(SyntheticSeriesGenerator::new),
            limiter,
            counters: FetchCounters::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    use crate::models::OhlcvBar;
    use crate::provider::SeriesRequest;

    struct FixedProvider {
        id: &'static str,
        priority: u8,
        bars: usize,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(id: &'static str, priority: u8, bars: usize) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                bars,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SeriesProvider for FixedProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        async fn fetch_bars(
            &self,
            request: &SeriesRequest<'_>,
        ) -> Result<Vec<OhlcvBar>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..self.bars)
                .map(|i| {
                    let date = request.window.end - ChronoDuration::days(i as i64);
                    OhlcvBar::new(date, dec!(100), dec!(101), dec!(99), dec!(100.5), 1_000)
                })
                .collect())
        }
    }

    fn quiet_limits() -> RateLimitConfig {
        RateLimitConfig {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            ..RateLimitConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiers_sorted_by_priority() {
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .provider(FixedProvider::new("SLOW", 5, 3))
            .provider(FixedProvider::new("FAST", 1, 3))
            .build();

        assert_eq!(orchestrator.tier_ids(), vec!["FAST", "SLOW"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_symbol_is_unavailable() {
        let provider = FixedProvider::new("ONLY", 1, 3);
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .provider(provider.clone())
            .build();

        assert!(matches!(
            orchestrator.fetch("23-30", 30).await,
            FetchOutcome::Unavailable
        ));
        assert!(matches!(
            orchestrator.fetch("2330", 0).await,
            FetchOutcome::Unavailable
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookback_above_ceiling_is_unavailable() {
        let provider = FixedProvider::new("ONLY", 1, 3);
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .provider(provider.clone())
            .build();

        assert!(matches!(
            orchestrator.fetch("2330", u32::MAX).await,
            FetchOutcome::Unavailable
        ));
        assert!(matches!(
            orchestrator.fetch("2330", MAX_LOOKBACK_DAYS + 1).await,
            FetchOutcome::Unavailable
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.get_stats().unavailable, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suffixed_input_shares_cache_entry() {
        let provider = FixedProvider::new("ONLY", 1, 5);
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .provider(provider.clone())
            .build();

        assert!(orchestrator.fetch("2330", 5).await.is_live());
        assert!(orchestrator.fetch(" 2330.tw", 5).await.is_live());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.get_stats().cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_cache_always_fetches() {
        let provider = FixedProvider::new("ONLY", 1, 5);
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .cache(false, Duration::from_secs(300), Duration::from_secs(60))
            .provider(provider.clone())
            .build();

        orchestrator.fetch("2330", 5).await;
        orchestrator.fetch("2330", 5).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert!(orchestrator.cache_stats().is_none());
        assert!(!orchestrator.invalidate("2330", 5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_disabled_gives_unavailable() {
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .synthetic(false)
            .provider(FixedProvider::new("EMPTY", 1, 0))
            .build();

        assert!(matches!(
            orchestrator.fetch("2330", 10).await,
            FetchOutcome::Unavailable
        ));
        assert_eq!(orchestrator.get_stats().cached_items, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let provider = FixedProvider::new("ONLY", 1, 5);
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .provider(provider.clone())
            .build();

        orchestrator.fetch("2330", 5).await;
        assert!(orchestrator.invalidate("2330", 5));
        orchestrator.fetch("2330", 5).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let provider = FixedProvider::new("ONLY", 1, 5);
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .provider(provider.clone())
            .build();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = orchestrator.fetch_with_cancel("2330", 5, &cancel).await;
        assert!(matches!(outcome, FetchOutcome::Cancelled));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.get_stats().cached_items, 0);
        assert_eq!(orchestrator.get_stats().cancelled, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_profile_from_reference_table() {
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .provider(FixedProvider::new("BARS_ONLY", 1, 5))
            .build();

        let profile = orchestrator
            .fetch_profile("2330.TW", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(profile.symbol, "2330");
        assert_eq!(profile.name.as_deref(), Some("台積電"));
        assert!(profile.degraded);
        assert!(profile.last_price.is_none());

        assert!(orchestrator
            .fetch_profile("", &CancellationToken::new())
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stats_keeps_cache() {
        let orchestrator = FallbackOrchestrator::builder()
            .rate_limit(quiet_limits())
            .provider(FixedProvider::new("ONLY", 1, 5))
            .build();

        orchestrator.fetch("2330", 5).await;
        orchestrator.reset_stats();

        let stats = orchestrator.get_stats();
        assert_eq!(stats.requests, 0);
        assert_eq!(stats.tier("ONLY").map(|t| t.success), Some(0));
        assert_eq!(stats.cached_items, 1);
    }

    #[test]
    fn test_from_config_builds_enabled_tiers() {
        let mut config = MarketDataConfig::default();
        config.providers.finmind_enabled = false;
        let orchestrator = FallbackOrchestrator::from_config(&config).unwrap();
        assert_eq!(orchestrator.tier_ids(), vec!["YAHOO"]);
    }
}
