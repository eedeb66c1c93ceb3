//! Market data provider trait definitions.
//!
//! This module defines the core `SeriesProvider` trait that every upstream
//! source implements. A provider performs exactly one network call per
//! method invocation; pacing, retry and variant ordering are handled by
//! [`ProviderAdapter`](super::ProviderAdapter).

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{DateWindow, OhlcvBar, ProviderSymbol, StockProfile};

/// One upstream query for one variant.
#[derive(Clone, Debug)]
pub struct SeriesRequest<'a> {
    /// Normalized symbol (e.g. `2330`)
    pub symbol: &'a str,
    /// Provider-specific query symbol (e.g. `2330.TW`)
    pub variant: &'a ProviderSymbol,
    pub window: DateWindow,
    /// Rotated identity for this call
    pub user_agent: &'static str,
    pub timeout: Duration,
}

/// Trait for market data providers.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use twstock_market_data::provider::{SeriesProvider, SeriesRequest};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl SeriesProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     async fn fetch_bars(&self, request: &SeriesRequest<'_>) -> Result<Vec<OhlcvBar>, MarketDataError> {
///         // one HTTP call, normalized into OhlcvBar rows
///     }
/// }
/// ```
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO" or "FINMIND".
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Ordered query variants for a normalized symbol.
    ///
    /// The first variant that yields rows wins. Default is the symbol itself.
    fn variants(&self, symbol: &str) -> Vec<ProviderSymbol> {
        vec![ProviderSymbol::from(symbol)]
    }

    /// Fetch daily bars for one variant.
    ///
    /// Bars may be unsorted and may cover more than `window.lookback_days`;
    /// the adapter sorts and trims. Return `RateLimited` for explicit
    /// throttling and `NoData` or an empty vector when the upstream has no rows.
    async fn fetch_bars(&self, request: &SeriesRequest<'_>)
        -> Result<Vec<OhlcvBar>, MarketDataError>;

    /// Fetch descriptive data for one variant.
    ///
    /// Default implementation reports the operation as unsupported.
    async fn fetch_profile(
        &self,
        request: &SeriesRequest<'_>,
    ) -> Result<StockProfile, MarketDataError> {
        Err(MarketDataError::ProviderError {
            provider: self.id().to_string(),
            message: format!("profile lookup not supported for {}", request.variant),
        })
    }
}
