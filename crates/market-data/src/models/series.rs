use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::bar::OhlcvBar;
use super::types::{ProviderId, ProviderSymbol};

/// Where a series came from.
///
/// Travels with the series through the cache, so a cached synthetic series is
/// still reported as degraded on every hit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SeriesOrigin {
    /// Real market data from an upstream provider.
    Live {
        provider: ProviderId,
        /// The query variant that produced rows (e.g. `2330.TWO`)
        variant: ProviderSymbol,
    },

    /// Reference data fabricated by the synthetic generator.
    /// Must be surfaced to the user as such.
    Synthetic,
}

/// Ordered daily bars for one symbol.
///
/// Bars are strictly ascending by date with no duplicate dates. The series is
/// immutable once built; callers share it as `Arc<TimeSeries>`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    symbol: String,
    origin: SeriesOrigin,
    bars: Vec<OhlcvBar>,
}

impl TimeSeries {
    /// Builds a series, sorting by date. When a provider repeats a date the
    /// last row for that date wins.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<OhlcvBar>, origin: SeriesOrigin) -> Self {
        bars.sort_by_key(|bar| bar.date);

        let mut unique: Vec<OhlcvBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match unique.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => unique.push(bar),
            }
        }

        Self {
            symbol: symbol.into(),
            origin,
            bars: unique,
        }
    }

    /// Keeps only the most recent `n` bars.
    pub fn tail(mut self, n: usize) -> Self {
        if self.bars.len() > n {
            self.bars.drain(..self.bars.len() - n);
        }
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn origin(&self) -> &SeriesOrigin {
        &self.origin
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// True when the bars are synthetic reference data.
    pub fn is_degraded(&self) -> bool {
        matches!(self.origin, SeriesOrigin::Synthetic)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|bar| bar.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|bar| bar.date)
    }

    pub fn last_close(&self) -> Option<Decimal> {
        self.bars.last().map(|bar| bar.close)
    }
}

/// Result of [`FallbackOrchestrator::fetch`](crate::FallbackOrchestrator::fetch).
///
/// Data-fetch failures never surface as errors; the caller always gets one of
/// these and must render `Degraded` and `Unavailable` explicitly.
#[derive(Clone, Debug)]
pub enum FetchOutcome {
    /// Real data from a provider tier (possibly served from cache).
    Live(Arc<TimeSeries>),

    /// Every real tier failed; synthetic reference data was substituted.
    Degraded(Arc<TimeSeries>),

    /// Not even synthesis could produce a series ("data unavailable").
    Unavailable,

    /// The caller's cancellation token fired before a result was produced.
    Cancelled,
}

impl FetchOutcome {
    /// Wraps a series, choosing `Live` or `Degraded` from its origin.
    pub fn from_series(series: Arc<TimeSeries>) -> Self {
        if series.is_degraded() {
            Self::Degraded(series)
        } else {
            Self::Live(series)
        }
    }

    pub fn series(&self) -> Option<&Arc<TimeSeries>> {
        match self {
            Self::Live(series) | Self::Degraded(series) => Some(series),
            Self::Unavailable | Self::Cancelled => None,
        }
    }

    pub fn into_series(self) -> Option<Arc<TimeSeries>> {
        match self {
            Self::Live(series) | Self::Degraded(series) => Some(series),
            Self::Unavailable | Self::Cancelled => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bar(day: u32, close: Decimal) -> OhlcvBar {
        let date = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        OhlcvBar::new(date, close, close, close, close, 100)
    }

    fn live() -> SeriesOrigin {
        SeriesOrigin::Live {
            provider: "YAHOO".into(),
            variant: "2330.TW".into(),
        }
    }

    #[test]
    fn test_new_sorts_ascending() {
        let series = TimeSeries::new(
            "2330",
            vec![bar(3, dec!(3)), bar(1, dec!(1)), bar(2, dec!(2))],
            live(),
        );
        let days: Vec<u32> = series
            .bars()
            .iter()
            .map(|b| chrono::Datelike::day(&b.date))
            .collect();
        assert_eq!(days, vec![1, 2, 3]);
    }

    #[test]
    fn test_new_drops_duplicate_dates_keeping_last() {
        let series = TimeSeries::new(
            "2330",
            vec![bar(1, dec!(1)), bar(2, dec!(2)), bar(2, dec!(20))],
            live(),
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.last_close(), Some(dec!(20)));
    }

    #[test]
    fn test_tail_keeps_most_recent() {
        let series = TimeSeries::new(
            "2330",
            (1..=10).map(|d| bar(d, Decimal::from(d))).collect(),
            live(),
        )
        .tail(3);
        assert_eq!(series.len(), 3);
        assert_eq!(series.first_date(), NaiveDate::from_ymd_opt(2024, 5, 8));
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2024, 5, 10));
    }

    #[test]
    fn test_tail_longer_than_series_is_noop() {
        let series = TimeSeries::new("2330", vec![bar(1, dec!(1))], live()).tail(30);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_outcome_follows_origin() {
        let synthetic = Arc::new(TimeSeries::new(
            "9999",
            vec![bar(1, dec!(1))],
            SeriesOrigin::Synthetic,
        ));
        let outcome = FetchOutcome::from_series(synthetic);
        assert!(outcome.is_degraded());
        assert!(outcome.series().is_some());

        let real = Arc::new(TimeSeries::new("2330", vec![bar(1, dec!(1))], live()));
        assert!(FetchOutcome::from_series(real).is_live());
    }

    #[test]
    fn test_unavailable_has_no_series() {
        assert!(FetchOutcome::Unavailable.into_series().is_none());
        assert!(FetchOutcome::Cancelled.series().is_none());
    }
}
