//! FinMind v4 API response models.

use serde::Deserialize;

/// Envelope shared by every FinMind dataset
#[derive(Debug, Deserialize)]
pub struct FinMindResponse<T> {
    #[serde(default)]
    pub msg: String,
    /// Mirrors the HTTP status; quota exhaustion is reported as 402
    pub status: Option<u16>,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// One row of the `TaiwanStockPrice` dataset.
///
/// FinMind names the high and low columns `max` and `min`.
#[derive(Debug, Deserialize)]
pub struct FinMindPriceRow {
    pub date: String,
    pub open: f64,
    pub max: f64,
    pub min: f64,
    pub close: f64,
    #[serde(rename = "Trading_Volume")]
    pub trading_volume: f64,
}

/// One row of the `TaiwanStockInfo` dataset
#[derive(Debug, Deserialize)]
pub struct FinMindInfoRow {
    pub stock_id: String,
    pub stock_name: Option<String>,
    pub industry_category: Option<String>,
    /// `twse` or `tpex`
    #[serde(rename = "type")]
    pub market: Option<String>,
}
