use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Descriptive stock data from market data providers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockProfile {
    /// Normalized symbol (e.g., "2330")
    pub symbol: String,

    /// Provider that supplied this profile (e.g., "YAHOO")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Company name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Industry category (e.g., "半導體業")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,

    /// Exchange name as reported upstream (e.g., "TAI", "TWO")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    /// Trading currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Most recent traded price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_price: Option<Decimal>,

    /// Previous session close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifty_two_week_high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fifty_two_week_low: Option<Decimal>,

    /// True when no provider answered and this is the reference fallback
    pub degraded: bool,
}

impl StockProfile {
    /// Fallback profile: name only, every numeric field absent.
    pub fn fallback(symbol: impl Into<String>, name: Option<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name,
            degraded: true,
            ..Default::default()
        }
    }
}
