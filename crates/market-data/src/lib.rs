//! Taiwan Equities Market Data Crate
//!
//! This crate fetches daily OHLCV history for TWSE/TPEx listings from
//! free, aggressively throttled upstream sources, and keeps answering
//! when they all fail.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple providers tried in priority order: Yahoo Finance, FinMind
//! - Probing the `.TW` and `.TWO` suffix conventions for dual-listed symbols
//! - A single admission budget with exponential backoff after a 429
//! - Retry with exponential delay for transient failures
//! - A TTL cache keyed by (symbol, lookback days)
//! - A deterministic synthetic series, clearly marked degraded, as last resort
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |     Caller       | --> |    TtlCache      |  (symbol, days) -> series
//! +------------------+     +------------------+
//!                                  | miss
//!                                  v
//!                       +----------------------+
//!                       | FallbackOrchestrator |  (ordered tiers)
//!                       +----------------------+
//!                                  |
//!                                  v
//!                       +----------------------+
//!                       |   ProviderAdapter    |  (variants x retry)
//!                       +----------------------+
//!                          |               |
//!                          v               v
//!                 +-------------+   +--------------+
//!                 | RateLimiter |   | UserAgent    |
//!                 +-------------+   | Rotator      |
//!                          |        +--------------+
//!                          v
//!                 +------------------+
//!                 |    Provider      |  (Yahoo, FinMind)
//!                 +------------------+
//!                          | all tiers empty
//!                          v
//!                 +------------------+
//!                 | SyntheticSeries  |  (degraded)
//!                 +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`FallbackOrchestrator`] - Entry point; construct once and share
//! - [`FetchOutcome`] - Live, degraded, unavailable or cancelled result
//! - [`TimeSeries`] - Ordered daily bars with their [`SeriesOrigin`]
//! - [`OhlcvBar`] - One trading day
//! - [`FetchStats`] - Counters for dashboards and tests
//! - [`MarketDataConfig`] - Configuration surface
//!
//! # Example
//!
//! ```no_run
//! use twstock_market_data::{FallbackOrchestrator, FetchOutcome, MarketDataConfig};
//!
//! # async fn run() -> Result<(), twstock_market_data::MarketDataError> {
//! let orchestrator = FallbackOrchestrator::from_config(&MarketDataConfig::default())?;
//! match orchestrator.fetch("2330", 30).await {
//!     FetchOutcome::Live(series) => println!("{} live bars", series.len()),
//!     FetchOutcome::Degraded(series) => println!("{} REFERENCE bars", series.len()),
//!     FetchOutcome::Unavailable | FetchOutcome::Cancelled => println!("data unavailable"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod synthetic;

// Re-export all public types from models
pub use models::{
    normalize_symbol, DateWindow, FetchKey, FetchOutcome, OhlcvBar, ProviderId, ProviderSymbol,
    SeriesOrigin, StockProfile, TimeSeries, MAX_LOOKBACK_DAYS,
};

// Re-export provider types
pub use provider::finmind::FinMindProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{ProviderAdapter, SeriesProvider, SeriesRequest, UserAgentRotator};

// Re-export registry types
pub use registry::{
    FallbackOrchestrator, FetchStats, OrchestratorBuilder, ProviderStats, RateLimitConfig,
    RateLimiter, RetryConfig, RetryHandler,
};

pub use cache::{CacheStats, SeriesCache, TtlCache};
pub use config::MarketDataConfig;
pub use errors::{MarketDataError, RetryClass};
pub use synthetic::{popular_symbols, PopularSymbol, SyntheticSeriesGenerator};
