//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Type aliases for common identifiers (ProviderId, ProviderSymbol)
//! - `bar` - One trading day (OhlcvBar)
//! - `series` - Immutable daily series and where it came from (TimeSeries, SeriesOrigin, FetchOutcome)
//! - `key` - Cache identity and request window (FetchKey, DateWindow)
//! - `profile` - Descriptive stock data (StockProfile)

mod bar;
mod key;
mod profile;
mod series;
mod types;

pub use bar::OhlcvBar;
pub use key::{
    is_well_formed_symbol, normalize_symbol, DateWindow, FetchKey, MAX_LOOKBACK_DAYS,
};
pub use profile::StockProfile;
pub use series::{FetchOutcome, SeriesOrigin, TimeSeries};
pub use types::{ProviderId, ProviderSymbol};
