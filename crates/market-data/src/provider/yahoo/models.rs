//! Yahoo Finance chart API response models.
//!
//! The v8 chart endpoint returns parallel arrays: one timestamp per session
//! and one OHLCV array each under `indicators.quote[0]`. Any element may be
//! `null` for sessions Yahoo has no data for.

use serde::Deserialize;

/// Main response wrapper for the chart API
#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    pub result: Option<Vec<YahooChartResult>>,
    pub error: Option<YahooChartError>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartError {
    pub code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Option<YahooIndicators>,
}

/// Session metadata; also the source of profile fields
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooChartMeta {
    pub currency: Option<String>,
    pub symbol: Option<String>,
    pub exchange_name: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    /// Seconds east of UTC for the listing exchange (28800 for Taipei)
    pub gmtoffset: Option<i32>,
    pub regular_market_price: Option<f64>,
    pub chart_previous_close: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooQuoteArrays>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YahooQuoteArrays {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_error_payload() {
        let json = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let response: YahooChartResponse = serde_json::from_str(json).unwrap();
        assert!(response.chart.result.is_none());
        assert_eq!(
            response.chart.error.and_then(|e| e.code).as_deref(),
            Some("Not Found")
        );
    }

    #[test]
    fn test_deserialize_nulls_in_arrays() {
        let json = r#"{"open":[1.0,null],"high":[2.0,null],"low":[0.5,null],"close":[1.5,null],"volume":[100,null]}"#;
        let arrays: YahooQuoteArrays = serde_json::from_str(json).unwrap();
        assert_eq!(arrays.open, vec![Some(1.0), None]);
        assert_eq!(arrays.volume, vec![Some(100.0), None]);
    }
}
