use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use twstock_market_data::{
    FallbackOrchestrator, FetchOutcome, MarketDataError, OhlcvBar, ProviderSymbol,
    RateLimitConfig, RateLimiter, RetryConfig, SeriesOrigin, SeriesProvider, SeriesRequest,
};

#[derive(Clone, Copy, Debug)]
enum Step {
    Bars(usize),
    Empty,
    RateLimited,
    Timeout,
    Stall(Duration),
}

struct ScriptedProvider {
    id: &'static str,
    priority: u8,
    suffixes: Vec<&'static str>,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    queried: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(id: &'static str, priority: u8, script: &[Step], fallback: Step) -> Arc<Self> {
        Self::with_suffixes(id, priority, &[], script, fallback)
    }

    fn with_suffixes(
        id: &'static str,
        priority: u8,
        suffixes: &[&'static str],
        script: &[Step],
        fallback: Step,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            priority,
            suffixes: suffixes.to_vec(),
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            queried: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

fn bars_ending(end: chrono::NaiveDate, count: usize) -> Vec<OhlcvBar> {
    (0..count)
        .map(|i| {
            let base = dec!(500) + Decimal::from(i as u64);
            OhlcvBar::new(
                end - chrono::Duration::days(i as i64),
                base,
                base + dec!(5),
                base - dec!(5),
                base + dec!(1),
                10_000 + i as u64,
            )
        })
        .collect()
}

#[async_trait]
impl SeriesProvider for ScriptedProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn variants(&self, symbol: &str) -> Vec<ProviderSymbol> {
        if self.suffixes.is_empty() {
            return vec![ProviderSymbol::from(symbol)];
        }
        self.suffixes
            .iter()
            .map(|suffix| ProviderSymbol::from(format!("{}{}", symbol, suffix)))
            .collect()
    }

    async fn fetch_bars(
        &self,
        request: &SeriesRequest<'_>,
    ) -> Result<Vec<OhlcvBar>, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queried.lock().unwrap().push(request.variant.to_string());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match step {
            Step::Bars(count) => Ok(bars_ending(request.window.end, count)),
            Step::Empty => Ok(Vec::new()),
            Step::RateLimited => Err(MarketDataError::RateLimited {
                provider: self.id.to_string(),
            }),
            Step::Timeout => Err(MarketDataError::Timeout {
                provider: self.id.to_string(),
            }),
            Step::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(bars_ending(request.window.end, 5))
            }
        }
    }
}

fn test_limits() -> RateLimitConfig {
    RateLimitConfig {
        max_requests: 100,
        time_window: Duration::from_secs(60),
        min_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        base_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(8),
        reset_window: Duration::from_secs(3600),
    }
}

fn test_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_secs(1),
        exponential_base: 2.0,
        jitter_ratio: 0.0,
    }
}

fn orchestrator(tiers: &[Arc<ScriptedProvider>]) -> FallbackOrchestrator {
    tiers
        .iter()
        .fold(
            FallbackOrchestrator::builder()
                .rate_limit(test_limits())
                .retry(test_retry(3))
                .request_timeout(Duration::from_secs(10))
                .cache(true, Duration::from_secs(300), Duration::from_secs(60)),
            |builder, tier| builder.provider(tier.clone()),
        )
        .build()
}

fn assert_ohlc_consistent(bars: &[OhlcvBar]) {
    for bar in bars {
        assert!(bar.high >= bar.open, "high < open on {}", bar.date);
        assert!(bar.high >= bar.close, "high < close on {}", bar.date);
        assert!(bar.high >= bar.low, "high < low on {}", bar.date);
        assert!(bar.low <= bar.open, "low > open on {}", bar.date);
        assert!(bar.low <= bar.close, "low > close on {}", bar.date);
    }
}

#[tokio::test(start_paused = true)]
async fn first_tier_with_data_wins() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Bars(45));
    let secondary = ScriptedProvider::new("SECONDARY", 2, &[], Step::Bars(45));
    let orchestrator = orchestrator(&[primary.clone(), secondary.clone()]);

    let outcome = orchestrator.fetch("2330", 30).await;

    let series = outcome.series().expect("live series");
    assert!(outcome.is_live());
    assert_eq!(series.len(), 30);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 0);
    assert!(series
        .bars()
        .windows(2)
        .all(|pair| pair[0].date < pair[1].date));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_twice_then_success_within_budget() {
    let primary = ScriptedProvider::new(
        "PRIMARY",
        1,
        &[Step::RateLimited, Step::RateLimited],
        Step::Bars(60),
    );
    let secondary = ScriptedProvider::new("SECONDARY", 2, &[], Step::Bars(60));
    let orchestrator = orchestrator(&[primary.clone(), secondary.clone()]);
    let started = Instant::now();

    let outcome = orchestrator.fetch("2330", 30).await;

    assert!(outcome.is_live());
    assert_eq!(outcome.series().map(|s| s.len()), Some(30));
    assert_eq!(primary.calls(), 3);
    assert_eq!(secondary.calls(), 0);

    let stats = orchestrator.get_stats();
    let tier = stats.tier("PRIMARY").unwrap();
    assert_eq!(tier.rate_limited, 2);
    assert_eq!(tier.success, 1);
    assert_eq!(stats.rate_limiter.consecutive_failures, 2);
    // backoffs of 1s then 2s were waited out
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn unknown_symbol_falls_through_to_degraded_series() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Empty);
    let secondary = ScriptedProvider::new("SECONDARY", 2, &[], Step::Empty);
    let orchestrator = orchestrator(&[primary.clone(), secondary.clone()]);

    let outcome = orchestrator.fetch("9999", 30).await;

    assert!(outcome.is_degraded());
    let series = outcome.series().unwrap();
    assert_eq!(series.len(), 30);
    assert!(series.is_degraded());
    assert_eq!(series.origin(), &SeriesOrigin::Synthetic);
    assert_eq!(primary.calls(), 1);
    assert_eq!(secondary.calls(), 1);
    assert_ohlc_consistent(series.bars());

    let stats = orchestrator.get_stats();
    assert_eq!(stats.degraded, 1);
    assert_eq!(stats.tier("PRIMARY").unwrap().no_data, 1);
    assert_eq!(stats.success_rate, 0.0);
}

#[tokio::test(start_paused = true)]
async fn cache_hit_within_ttl_and_miss_after() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Bars(120));
    let orchestrator = orchestrator(&[primary.clone()]);

    assert!(orchestrator.fetch("2330", 90).await.is_live());
    assert_eq!(primary.calls(), 1);

    tokio::time::advance(Duration::from_secs(100)).await;
    assert!(orchestrator.fetch("2330", 90).await.is_live());
    assert_eq!(primary.calls(), 1);

    tokio::time::advance(Duration::from_secs(300)).await;
    assert!(orchestrator.fetch("2330", 90).await.is_live());
    assert_eq!(primary.calls(), 2);

    let stats = orchestrator.get_stats();
    assert_eq!(stats.requests, 3);
    assert_eq!(stats.cache_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn different_lookbacks_are_cached_separately() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Bars(120));
    let orchestrator = orchestrator(&[primary.clone()]);

    orchestrator.fetch("2330", 30).await;
    orchestrator.fetch("2330", 90).await;
    assert_eq!(primary.calls(), 2);
    assert_eq!(orchestrator.get_stats().cached_items, 2);
}

#[tokio::test(start_paused = true)]
async fn degraded_marker_survives_cache() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Empty);
    let orchestrator = orchestrator(&[primary.clone()]);

    let first = orchestrator.fetch("9999", 20).await;
    let second = orchestrator.fetch("9999", 20).await;

    assert!(first.is_degraded());
    assert!(second.is_degraded());
    assert_eq!(primary.calls(), 1);
    assert_eq!(
        first.series().unwrap().bars(),
        second.series().unwrap().bars()
    );

    // degraded entries expire sooner so real tiers get another chance
    tokio::time::advance(Duration::from_secs(61)).await;
    orchestrator.fetch("9999", 20).await;
    assert_eq!(primary.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_variant_used_when_first_is_empty() {
    let primary = ScriptedProvider::with_suffixes(
        "PRIMARY",
        1,
        &[".TW", ".TWO"],
        &[Step::Empty],
        Step::Bars(40),
    );
    let orchestrator = orchestrator(&[primary.clone()]);

    let outcome = orchestrator.fetch("6488", 20).await;

    assert!(outcome.is_live());
    assert_eq!(primary.queried(), vec!["6488.TW", "6488.TWO"]);
    match outcome.series().unwrap().origin() {
        SeriesOrigin::Live { provider, variant } => {
            assert_eq!(provider, "PRIMARY");
            assert_eq!(variant.as_ref(), "6488.TWO");
        }
        other => panic!("unexpected origin {:?}", other),
    }

    let stats = orchestrator.get_stats();
    let tier = stats.tier("PRIMARY").unwrap();
    assert_eq!(tier.no_data, 1);
    assert_eq!(tier.variant_successes.get("6488.TWO"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn persistent_rate_limit_abandons_tier() {
    let primary = ScriptedProvider::with_suffixes(
        "PRIMARY",
        1,
        &[".TW", ".TWO"],
        &[],
        Step::RateLimited,
    );
    let secondary = ScriptedProvider::new("SECONDARY", 2, &[], Step::Bars(40));
    let orchestrator = orchestrator(&[primary.clone(), secondary.clone()]);

    let outcome = orchestrator.fetch("2330", 20).await;

    assert!(outcome.is_live());
    // max_retries = 3, all on the first variant; the second is never tried
    assert_eq!(primary.calls(), 4);
    assert!(primary.queried().iter().all(|v| v == "2330.TW"));
    assert_eq!(secondary.calls(), 1);
    assert_eq!(
        orchestrator.get_stats().tier("PRIMARY").unwrap().rate_limited,
        4
    );
}

#[tokio::test(start_paused = true)]
async fn transient_timeout_is_retried() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[Step::Timeout], Step::Bars(40));
    let orchestrator = orchestrator(&[primary.clone()]);

    assert!(orchestrator.fetch("2330", 20).await.is_live());
    assert_eq!(primary.calls(), 2);

    let stats = orchestrator.get_stats();
    let tier = stats.tier("PRIMARY").unwrap();
    assert_eq!(tier.other_error, 1);
    assert_eq!(tier.success, 1);
    assert_eq!(stats.rate_limiter.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn slow_upstream_hits_request_timeout() {
    let primary = ScriptedProvider::new(
        "PRIMARY",
        1,
        &[Step::Stall(Duration::from_secs(30))],
        Step::Bars(40),
    );
    let orchestrator = orchestrator(&[primary.clone()]);

    assert!(orchestrator.fetch("2330", 20).await.is_live());
    assert_eq!(primary.calls(), 2);
    assert_eq!(orchestrator.get_stats().tier("PRIMARY").unwrap().other_error, 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_call_skips_synthesis_and_cache() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Stall(Duration::from_secs(9)));
    let orchestrator = orchestrator(&[primary.clone()]);
    let cancel = CancellationToken::new();
    let started = Instant::now();

    let (outcome, _) = tokio::join!(orchestrator.fetch_with_cancel("2330", 20, &cancel), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    assert!(matches!(outcome, FetchOutcome::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(9));
    let stats = orchestrator.get_stats();
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.degraded, 0);
    assert_eq!(stats.cached_items, 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::RateLimited);
    let orchestrator = FallbackOrchestrator::builder()
        .rate_limit(RateLimitConfig {
            base_backoff: Duration::from_secs(120),
            max_backoff: Duration::from_secs(600),
            ..test_limits()
        })
        .retry(test_retry(3))
        .provider(primary.clone())
        .build();
    let cancel = CancellationToken::new();
    let started = Instant::now();

    let (outcome, _) = tokio::join!(orchestrator.fetch_with_cancel("2330", 20, &cancel), async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
    });

    assert!(matches!(outcome, FetchOutcome::Cancelled));
    assert_eq!(primary.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn admission_budget_is_shared_across_symbols() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Bars(40));
    let orchestrator = FallbackOrchestrator::builder()
        .rate_limit(RateLimitConfig {
            max_requests: 2,
            ..test_limits()
        })
        .retry(test_retry(0))
        .provider(primary.clone())
        .build();
    let started = Instant::now();

    orchestrator.fetch("2330", 20).await;
    orchestrator.fetch("2317", 20).await;
    assert!(started.elapsed() < Duration::from_secs(1));

    orchestrator.fetch("2454", 20).await;
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(primary.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn per_tier_limiter_keeps_budgets_apart() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Empty);
    let secondary = ScriptedProvider::new("SECONDARY", 2, &[], Step::Bars(40));
    let own_limiter = Arc::new(RateLimiter::new(test_limits()));
    let orchestrator = FallbackOrchestrator::builder()
        .rate_limit(test_limits())
        .retry(test_retry(0))
        .provider(primary.clone())
        .provider_with_limiter(secondary.clone(), own_limiter.clone())
        .build();

    orchestrator.fetch("2330", 20).await;

    assert_eq!(own_limiter.snapshot().requests_in_window, 1);
    assert_eq!(orchestrator.rate_limiter().snapshot().requests_in_window, 1);
}

#[tokio::test(start_paused = true)]
async fn every_served_bar_is_consistent() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[], Step::Bars(40));
    let live_tiers = orchestrator(&[primary]);
    let live = live_tiers.fetch("2330", 30).await;
    assert_ohlc_consistent(live.series().unwrap().bars());

    let empty = ScriptedProvider::new("EMPTY", 1, &[], Step::Empty);
    let fallback = orchestrator(&[empty]);
    for symbol in ["2330", "2603", "9999", "ABC1"] {
        let outcome = fallback.fetch(symbol, 60).await;
        assert!(outcome.is_degraded());
        assert_ohlc_consistent(outcome.series().unwrap().bars());
    }
}

#[tokio::test(start_paused = true)]
async fn success_rate_counts_live_against_degraded() {
    let primary = ScriptedProvider::new("PRIMARY", 1, &[Step::Bars(40)], Step::Empty);
    let orchestrator = orchestrator(&[primary]);

    assert!(orchestrator.fetch("2330", 20).await.is_live());
    assert!(orchestrator.fetch("9999", 20).await.is_degraded());
    // cache hit, not part of the rate
    orchestrator.fetch("2330", 20).await;

    let stats = orchestrator.get_stats();
    assert_eq!(stats.success_rate, 0.5);
    assert_eq!(stats.cache_hits, 1);
}
