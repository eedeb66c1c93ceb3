//! Deterministic synthetic series, the last tier of the fallback chain.
//!
//! The walk is seeded from a SHA-256 of the symbol, so the same
//! `(symbol, days, end)` always yields the same bars. Output is always
//! marked [`SeriesOrigin::Synthetic`].

mod reference;

use std::f64::consts::PI;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

pub use reference::{lookup, popular_symbols, PopularSymbol, ReferenceStock, REFERENCE_STOCKS};

use crate::models::{
    is_well_formed_symbol, OhlcvBar, SeriesOrigin, TimeSeries, MAX_LOOKBACK_DAYS,
};

const DAILY_DRIFT: f64 = 0.001;
const DEFAULT_VOLATILITY: f64 = 0.02;
const OPEN_GAP_SD: f64 = 0.005;
const WICK_SD: f64 = 0.01;
const MIN_PRICE: f64 = 0.01;

/// Generates reference series for symbols no provider could serve.
#[derive(Clone, Debug)]
pub struct SyntheticSeriesGenerator {
    default_volatility: f64,
}

impl SyntheticSeriesGenerator {
    pub fn new() -> Self {
        Self {
            default_volatility: DEFAULT_VOLATILITY,
        }
    }

    /// `days` weekday bars ending on or before `end`.
    ///
    /// Returns `None` for a malformed symbol or a `days` outside `1..=MAX_LOOKBACK_DAYS`.
    pub fn generate(&self, symbol: &str, days: u32, end: NaiveDate) -> Option<TimeSeries> {
        if days == 0 || days > MAX_LOOKBACK_DAYS || !is_well_formed_symbol(symbol) {
            return None;
        }

        let seed = symbol_seed(symbol);
        let (base_price, volatility) = match reference::lookup(symbol) {
            Some(stock) => (stock.base_price, stock.volatility),
            None => (hashed_base_price(seed), self.default_volatility),
        };
        info!(
            "Generating {} synthetic bars for {} (base {:.2})",
            days, symbol, base_price
        );

        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = base_price;
        let bars = trading_days(end, days)
            .into_iter()
            .map(|date| {
                let close = (price * (1.0 + DAILY_DRIFT + volatility * standard_normal(&mut rng)))
                    .max(MIN_PRICE);
                let open = (price * (1.0 + OPEN_GAP_SD * standard_normal(&mut rng))).max(MIN_PRICE);
                let high = open.max(close) * (1.0 + (WICK_SD * standard_normal(&mut rng)).abs());
                let low = (open.min(close) * (1.0 - (WICK_SD * standard_normal(&mut rng)).abs()))
                    .max(MIN_PRICE);
                let volume = rng.gen_range(10_000u64..50_000) * 1_000;
                price = close;

                OhlcvBar::new(
                    date,
                    to_price(open),
                    to_price(high),
                    to_price(low),
                    to_price(close),
                    volume,
                )
            })
            .collect();

        Some(TimeSeries::new(symbol, bars, SeriesOrigin::Synthetic))
    }
}

impl Default for SyntheticSeriesGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn symbol_seed(symbol: &str) -> u64 {
    let digest = Sha256::digest(symbol.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Base price in [20, 500) for symbols outside the reference table.
fn hashed_base_price(seed: u64) -> f64 {
    20.0 + (seed % 48_000) as f64 / 100.0
}

/// Box-Muller transform.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn to_price(value: f64) -> Decimal {
    Decimal::from_f64_retain(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp(2)
}

/// The last `count` weekdays on or before `end`, ascending.
///
/// Stops early if the calendar runs out before `count` is reached.
fn trading_days(end: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let count = count.min(MAX_LOOKBACK_DAYS) as usize;
    let mut days = Vec::with_capacity(count);
    let mut date = Some(end);
    while days.len() < count {
        let Some(current) = date else { break };
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(current);
        }
        date = current.checked_sub_signed(Duration::days(1));
    }
    days.reverse();
    days
}
