//! Caching layer for fetched series
//!
//! In-memory only: a restart starts cold.

pub mod ttl_cache;

use std::sync::Arc;

pub use ttl_cache::{CacheEntryStats, CacheStats, TtlCache};

use crate::models::{FetchKey, TimeSeries};

/// Series cache keyed by (symbol, lookback days)
pub type SeriesCache = TtlCache<FetchKey, Arc<TimeSeries>>;
