use std::fmt;

use chrono::{Duration, NaiveDate};

/// Longest symbol accepted (TWSE/TPEx codes are 4-6 characters).
const MAX_SYMBOL_LEN: usize = 10;

/// Extra calendar days requested so weekends and holidays still leave
/// enough trading days to fill the lookback.
const CALENDAR_PADDING_DAYS: i64 = 30;

/// Longest lookback a fetch accepts, roughly ten years of calendar days.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

/// Trims, upper-cases and strips a user-supplied market suffix.
///
/// `" 2330.tw "` and `"2330.TWO"` both become `"2330"`.
pub fn normalize_symbol(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    let bare = upper
        .strip_suffix(".TWO")
        .or_else(|| upper.strip_suffix(".TW"))
        .unwrap_or(&upper);
    bare.to_string()
}

/// A normalized symbol that providers and the synthetic tier can work with.
pub fn is_well_formed_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Cache and identity key: (normalized symbol, lookback days).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub symbol: String,
    pub lookback_days: u32,
}

impl FetchKey {
    pub fn new(symbol: &str, lookback_days: u32) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            lookback_days,
        }
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.lookback_days)
    }
}

/// Calendar range sent to providers for a lookback of `lookback_days` bars.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Number of bars the caller wants; adapters keep the last this many.
    pub lookback_days: u32,
}

impl DateWindow {
    pub fn for_lookback(lookback_days: u32, today: NaiveDate) -> Self {
        let span = i64::from(lookback_days) + CALENDAR_PADDING_DAYS;
        Self {
            start: today
                .checked_sub_signed(Duration::days(span))
                .unwrap_or(NaiveDate::MIN),
            end: today,
            lookback_days,
        }
    }
}
