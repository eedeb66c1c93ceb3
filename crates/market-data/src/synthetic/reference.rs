//! Reference table of well-known listings.
//!
//! Base prices and daily volatilities seed the synthetic tier; names back the
//! fallback profile and the popular-symbols list.

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferenceStock {
    pub code: &'static str,
    pub name: &'static str,
    pub base_price: f64,
    pub volatility: f64,
}

const fn stock(code: &'static str, name: &'static str, base_price: f64, volatility: f64) -> ReferenceStock {
    ReferenceStock {
        code,
        name,
        base_price,
        volatility,
    }
}

/// Ordered roughly by market weight.
pub const REFERENCE_STOCKS: &[ReferenceStock] = &[
    stock("2330", "台積電", 1710.0, 0.015),
    stock("2317", "鴻海", 215.0, 0.02),
    stock("2454", "聯發科", 1350.0, 0.02),
    stock("2308", "台達電", 385.0, 0.015),
    stock("2382", "廣達", 340.0, 0.02),
    stock("2303", "聯電", 52.0, 0.02),
    stock("2881", "富邦金", 98.0, 0.015),
    stock("2882", "國泰金", 72.0, 0.015),
    stock("2886", "兆豐金", 48.0, 0.015),
    stock("2412", "中華電", 132.0, 0.01),
    stock("2891", "中信金", 35.0, 0.015),
    stock("3008", "大立光", 2150.0, 0.02),
    stock("2603", "長榮", 215.0, 0.025),
    stock("0050", "元大台灣50", 195.0, 0.01),
];

pub fn lookup(code: &str) -> Option<&'static ReferenceStock> {
    REFERENCE_STOCKS.iter().find(|stock| stock.code == code)
}

/// A dashboard row for when no live ranking is available.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularSymbol {
    pub code: &'static str,
    pub name: &'static str,
    pub reference_price: Decimal,
}

/// The first `limit` reference listings.
pub fn popular_symbols(limit: usize) -> Vec<PopularSymbol> {
    REFERENCE_STOCKS
        .iter()
        .take(limit)
        .map(|stock| PopularSymbol {
            code: stock.code,
            name: stock.name,
            reference_price: Decimal::from_f64_retain(stock.base_price)
                .unwrap_or_default()
                .round_dp(2),
        })
        .collect()
}
