//! Fetch counters for dashboards and tests.
//!
//! Counters are observational only; no control flow reads them.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::warn;
use serde::Serialize;

use super::rate_limiter::RateLimiterSnapshot;

/// Per-tier counters, owned by a [`ProviderAdapter`](crate::provider::ProviderAdapter).
#[derive(Debug, Default)]
pub struct TierCounters {
    success: AtomicU64,
    rate_limited: AtomicU64,
    other_error: AtomicU64,
    no_data: AtomicU64,
    variant_successes: Mutex<HashMap<String, u64>>,
}

impl TierCounters {
    fn lock_variants(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.variant_successes.lock().unwrap_or_else(|poisoned| {
            warn!("Tier counters mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub(crate) fn record_success(&self, variant: &str) {
        self.success.fetch_add(1, Ordering::Relaxed);
        *self.lock_variants().entry(variant.to_string()).or_insert(0) += 1;
    }

    /// One per 429 response, not per fetch.
    pub(crate) fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_other_error(&self) {
        self.other_error.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_no_data(&self) {
        self.no_data.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, provider: &str) -> ProviderStats {
        ProviderStats {
            provider: provider.to_string(),
            success: self.success.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            other_error: self.other_error.load(Ordering::Relaxed),
            no_data: self.no_data.load(Ordering::Relaxed),
            variant_successes: self
                .lock_variants()
                .iter()
                .map(|(variant, count)| (variant.clone(), *count))
                .collect(),
        }
    }

    pub fn reset(&self) {
        self.success.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
        self.other_error.store(0, Ordering::Relaxed);
        self.no_data.store(0, Ordering::Relaxed);
        self.lock_variants().clear();
    }
}

/// Snapshot of one tier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub provider: String,
    /// Fetches this tier answered with a non-empty series
    pub success: u64,
    /// Explicit throttling responses
    pub rate_limited: u64,
    /// Failed attempts other than throttling or empty answers
    pub other_error: u64,
    /// Variants that answered with no rows
    pub no_data: u64,
    /// Successes keyed by the query variant that produced them (e.g. `2330.TWO`)
    pub variant_successes: BTreeMap<String, u64>,
}

/// Orchestrator-level counters.
#[derive(Debug, Default)]
pub(crate) struct FetchCounters {
    pub requests: AtomicU64,
    pub cache_hits: AtomicU64,
    pub degraded: AtomicU64,
    pub unavailable: AtomicU64,
    pub cancelled: AtomicU64,
}

impl FetchCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        for counter in [
            &self.requests,
            &self.cache_hits,
            &self.degraded,
            &self.unavailable,
            &self.cancelled,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Everything [`FallbackOrchestrator::get_stats`](crate::FallbackOrchestrator::get_stats) reports.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchStats {
    /// Calls to `fetch`
    pub requests: u64,
    pub cache_hits: u64,
    /// Fetches answered with synthetic data
    pub degraded: u64,
    /// Fetches answered with the empty sentinel
    pub unavailable: u64,
    pub cancelled: u64,
    /// Share of non-cached, non-cancelled fetches served by a real tier (0.0 - 1.0)
    pub success_rate: f64,
    pub tiers: Vec<ProviderStats>,
    pub cached_items: usize,
    pub rate_limiter: RateLimiterSnapshot,
}

impl FetchStats {
    pub(crate) fn new(
        counters: &FetchCounters,
        tiers: Vec<ProviderStats>,
        cached_items: usize,
        rate_limiter: RateLimiterSnapshot,
    ) -> Self {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let live: u64 = tiers.iter().map(|t| t.success).sum();
        let degraded = load(&counters.degraded);
        let unavailable = load(&counters.unavailable);
        let answered = live + degraded + unavailable;

        Self {
            requests: load(&counters.requests),
            cache_hits: load(&counters.cache_hits),
            degraded,
            unavailable,
            cancelled: load(&counters.cancelled),
            success_rate: if answered == 0 {
                0.0
            } else {
                live as f64 / answered as f64
            },
            tiers,
            cached_items,
            rate_limiter,
        }
    }

    pub fn tier(&self, provider: &str) -> Option<&ProviderStats> {
        self.tiers.iter().find(|t| t.provider == provider)
    }
}
