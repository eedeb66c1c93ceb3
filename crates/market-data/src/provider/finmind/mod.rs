//! FinMind market data provider.
//!
//! Regional API for Taiwan listings, queried by bare stock id and an explicit
//! date range. Quota exhaustion comes back as HTTP 402 and is treated like a 429.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use num_traits::ToPrimitive;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{OhlcvBar, StockProfile};
use crate::provider::user_agent::browser_headers;
use crate::provider::{SeriesProvider, SeriesRequest};

use models::{FinMindInfoRow, FinMindPriceRow, FinMindResponse};

pub const FINMIND_PROVIDER_ID: &str = "FINMIND";

const DATA_URL: &str = "https://api.finmindtrade.com/api/v4/data";
const PRICE_DATASET: &str = "TaiwanStockPrice";
const INFO_DATASET: &str = "TaiwanStockInfo";

/// FinMind REST provider.
pub struct FinMindProvider {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl FinMindProvider {
    pub fn new(timeout: Duration, token: Option<String>) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::ProviderError {
                provider: FINMIND_PROVIDER_ID.to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: DATA_URL.to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_dataset<T: DeserializeOwned>(
        &self,
        request: &SeriesRequest<'_>,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, MarketDataError> {
        let mut builder = self
            .client
            .get(&self.base_url)
            .headers(browser_headers(request.user_agent))
            .query(query)
            .timeout(request.timeout);
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MarketDataError::from_request(FINMIND_PROVIDER_ID, e))?;

        let status = response.status();
        if status == StatusCode::PAYMENT_REQUIRED {
            return Err(MarketDataError::RateLimited {
                provider: FINMIND_PROVIDER_ID.to_string(),
            });
        }
        if !status.is_success() {
            debug!("FinMind returned {} for {}", status, request.variant);
            return Err(MarketDataError::from_status(
                FINMIND_PROVIDER_ID,
                status,
                request.variant,
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MarketDataError::from_request(FINMIND_PROVIDER_ID, e))?;

        parse_envelope(&body)
    }
}

#[async_trait]
impl SeriesProvider for FinMindProvider {
    fn id(&self) -> &'static str {
        FINMIND_PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    async fn fetch_bars(
        &self,
        request: &SeriesRequest<'_>,
    ) -> Result<Vec<OhlcvBar>, MarketDataError> {
        let query = [
            ("dataset", PRICE_DATASET.to_string()),
            ("data_id", request.variant.to_string()),
            ("start_date", request.window.start.format("%Y-%m-%d").to_string()),
            ("end_date", request.window.end.format("%Y-%m-%d").to_string()),
        ];

        let rows: Vec<FinMindPriceRow> = self.get_dataset(request, &query).await?;
        rows_to_bars(rows)
    }

    async fn fetch_profile(
        &self,
        request: &SeriesRequest<'_>,
    ) -> Result<StockProfile, MarketDataError> {
        let query = [
            ("dataset", INFO_DATASET.to_string()),
            ("data_id", request.variant.to_string()),
        ];

        let rows: Vec<FinMindInfoRow> = self.get_dataset(request, &query).await?;
        rows.into_iter()
            .find(|row| row.stock_id.as_str() == request.variant.as_ref())
            .map(|row| info_to_profile(request.symbol, row))
            .ok_or_else(|| MarketDataError::NoData {
                provider: FINMIND_PROVIDER_ID.to_string(),
                symbol: request.variant.to_string(),
            })
    }
}

/// Unwraps the `{msg, status, data}` envelope.
fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, MarketDataError> {
    let response: FinMindResponse<T> =
        serde_json::from_str(body).map_err(|e| MarketDataError::Schema {
            provider: FINMIND_PROVIDER_ID.to_string(),
            message: format!("Failed to parse response: {}", e),
        })?;

    match response.status {
        None | Some(200) => Ok(response.data),
        Some(402) | Some(429) => Err(MarketDataError::RateLimited {
            provider: FINMIND_PROVIDER_ID.to_string(),
        }),
        Some(code) => Err(MarketDataError::ProviderError {
            provider: FINMIND_PROVIDER_ID.to_string(),
            message: format!("status {}: {}", code, response.msg),
        }),
    }
}

fn to_price(value: f64) -> Option<Decimal> {
    Decimal::from_f64_retain(value).map(|d| d.round_dp(2))
}

/// Renames `max`/`min`/`Trading_Volume` into the canonical bar.
///
/// Suspended sessions are reported with zero prices and are skipped.
fn rows_to_bars(rows: Vec<FinMindPriceRow>) -> Result<Vec<OhlcvBar>, MarketDataError> {
    let mut bars = Vec::with_capacity(rows.len());
    let mut suspended = 0usize;

    for row in rows {
        let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|e| {
            MarketDataError::Schema {
                provider: FINMIND_PROVIDER_ID.to_string(),
                message: format!("bad date {:?}: {}", row.date, e),
            }
        })?;

        if row.close <= 0.0 {
            suspended += 1;
            continue;
        }

        let prices = (
            to_price(row.open),
            to_price(row.max),
            to_price(row.min),
            to_price(row.close),
        );
        let (Some(open), Some(high), Some(low), Some(close)) = prices else {
            return Err(MarketDataError::Schema {
                provider: FINMIND_PROVIDER_ID.to_string(),
                message: format!("non-finite price on {}", row.date),
            });
        };

        bars.push(OhlcvBar::new(
            date,
            open,
            high,
            low,
            close,
            row.trading_volume.to_u64().unwrap_or(0),
        ));
    }

    if suspended > 0 {
        warn!("Skipped {} suspended sessions", suspended);
    }
    Ok(bars)
}

fn info_to_profile(symbol: &str, row: FinMindInfoRow) -> StockProfile {
    StockProfile {
        symbol: symbol.to_string(),
        source: Some(FINMIND_PROVIDER_ID.to_string()),
        name: row.stock_name,
        sector: row.industry_category,
        exchange: row.market.map(|m| m.to_ascii_uppercase()),
        currency: Some("TWD".to_string()),
        ..Default::default()
    }
}
