//! Yahoo Finance market data provider.
//!
//! Taiwan listings live under two suffixes: `.TW` for the main board (TWSE)
//! and `.TWO` for the OTC market (TPEx). The provider exposes both as query
//! variants, main board first.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveTime};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{OhlcvBar, ProviderSymbol, StockProfile};
use crate::provider::user_agent::browser_headers;
use crate::provider::{SeriesProvider, SeriesRequest};

use models::{YahooChartMeta, YahooChartResponse, YahooChartResult, YahooQuoteArrays};

pub const YAHOO_PROVIDER_ID: &str = "YAHOO";

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Main board first, then OTC.
const MARKET_SUFFIXES: [&str; 2] = [".TW", ".TWO"];

/// Asia/Taipei, used when the response omits `gmtoffset`.
const TAIPEI_GMT_OFFSET: i32 = 8 * 3600;

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance chart API provider.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new(timeout: Duration) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::ProviderError {
                provider: YAHOO_PROVIDER_ID.to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: CHART_URL.to_string(),
        })
    }

    /// Point the provider at a different chart endpoint (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_chart(
        &self,
        request: &SeriesRequest<'_>,
        query: &[(&str, String)],
    ) -> Result<YahooChartResult, MarketDataError> {
        let url = format!("{}/{}", self.base_url, encode(request.variant));

        let response = self
            .client
            .get(&url)
            .headers(browser_headers(request.user_agent))
            .query(query)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| MarketDataError::from_request(YAHOO_PROVIDER_ID, e))?;

        let status = response.status();
        if !status.is_success() {
            debug!("Yahoo returned {} for {}", status, request.variant);
            return Err(MarketDataError::from_status(
                YAHOO_PROVIDER_ID,
                status,
                request.variant,
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MarketDataError::from_request(YAHOO_PROVIDER_ID, e))?;

        parse_chart(&body, request.variant)
    }
}

// ============================================================================
// SeriesProvider Implementation
// ============================================================================

#[async_trait]
impl SeriesProvider for YahooProvider {
    fn id(&self) -> &'static str {
        YAHOO_PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn variants(&self, symbol: &str) -> Vec<ProviderSymbol> {
        MARKET_SUFFIXES
            .iter()
            .map(|suffix| ProviderSymbol::from(format!("{}{}", symbol, suffix)))
            .collect()
    }

    async fn fetch_bars(
        &self,
        request: &SeriesRequest<'_>,
    ) -> Result<Vec<OhlcvBar>, MarketDataError> {
        let start = request.window.start.and_time(NaiveTime::MIN).and_utc();
        let end = request
            .window
            .end
            .succ_opt()
            .unwrap_or(request.window.end)
            .and_time(NaiveTime::MIN)
            .and_utc();

        debug!(
            "Fetching daily bars for {} from {} to {}",
            request.variant, request.window.start, request.window.end
        );

        let query = [
            ("period1", start.timestamp().to_string()),
            ("period2", end.timestamp().to_string()),
            ("interval", "1d".to_string()),
            ("events", "history".to_string()),
        ];
        let chart = self.get_chart(request, &query).await?;
        chart_to_bars(&chart, request.variant)
    }

    async fn fetch_profile(
        &self,
        request: &SeriesRequest<'_>,
    ) -> Result<StockProfile, MarketDataError> {
        let query = [
            ("range", "5d".to_string()),
            ("interval", "1d".to_string()),
        ];
        let chart = self.get_chart(request, &query).await?;
        Ok(meta_to_profile(request.symbol, &chart.meta))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_chart(body: &str, variant: &str) -> Result<YahooChartResult, MarketDataError> {
    let response: YahooChartResponse =
        serde_json::from_str(body).map_err(|e| MarketDataError::Schema {
            provider: YAHOO_PROVIDER_ID.to_string(),
            message: format!("Failed to parse chart response: {}", e),
        })?;

    if let Some(error) = response.chart.error {
        debug!(
            "Yahoo chart error for {}: {}",
            variant,
            error.description.or(error.code).unwrap_or_default()
        );
        return Err(MarketDataError::NoData {
            provider: YAHOO_PROVIDER_ID.to_string(),
            symbol: variant.to_string(),
        });
    }

    response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| MarketDataError::NoData {
            provider: YAHOO_PROVIDER_ID.to_string(),
            symbol: variant.to_string(),
        })
}

fn to_price(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value).map(|d| d.round_dp(2))
}

/// Zips the parallel arrays into bars, skipping sessions with a null price.
fn chart_to_bars(chart: &YahooChartResult, variant: &str) -> Result<Vec<OhlcvBar>, MarketDataError> {
    if chart.timestamp.is_empty() {
        return Ok(Vec::new());
    }

    let quote = chart
        .indicators
        .as_ref()
        .and_then(|indicators| indicators.quote.first())
        .ok_or_else(|| MarketDataError::Schema {
            provider: YAHOO_PROVIDER_ID.to_string(),
            message: format!("{}: timestamps without quote indicators", variant),
        })?;

    let offset = FixedOffset::east_opt(chart.meta.gmtoffset.unwrap_or(TAIPEI_GMT_OFFSET))
        .or_else(|| FixedOffset::east_opt(TAIPEI_GMT_OFFSET))
        .ok_or_else(|| MarketDataError::Schema {
            provider: YAHOO_PROVIDER_ID.to_string(),
            message: "invalid gmtoffset".to_string(),
        })?;

    let bars: Vec<OhlcvBar> = chart
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| bar_at(quote, &offset, *ts, i))
        .collect();

    let skipped = chart.timestamp.len() - bars.len();
    if skipped > 0 {
        warn!("Skipped {} incomplete sessions for {}", skipped, variant);
    }
    Ok(bars)
}

fn bar_at(quote: &YahooQuoteArrays, offset: &FixedOffset, ts: i64, i: usize) -> Option<OhlcvBar> {
    let column = |values: &[Option<f64>]| values.get(i).copied().flatten();

    let date = DateTime::from_timestamp(ts, 0)?
        .with_timezone(offset)
        .date_naive();

    Some(OhlcvBar::new(
        date,
        to_price(column(&quote.open)?)?,
        to_price(column(&quote.high)?)?,
        to_price(column(&quote.low)?)?,
        to_price(column(&quote.close)?)?,
        column(&quote.volume).and_then(|v| v.to_u64()).unwrap_or(0),
    ))
}

fn meta_to_profile(symbol: &str, meta: &YahooChartMeta) -> StockProfile {
    StockProfile {
        symbol: symbol.to_string(),
        source: Some(YAHOO_PROVIDER_ID.to_string()),
        name: meta.long_name.clone().or_else(|| meta.short_name.clone()),
        sector: None,
        exchange: meta.exchange_name.clone(),
        currency: meta.currency.clone(),
        last_price: meta.regular_market_price.and_then(to_price),
        previous_close: meta.chart_previous_close.and_then(to_price),
        fifty_two_week_high: meta.fifty_two_week_high.and_then(to_price),
        fifty_two_week_low: meta.fifty_two_week_low.and_then(to_price),
        degraded: false,
    }
}

// ============================================================================
// Tests
// ============================================================================
