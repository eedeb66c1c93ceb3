use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use twstock_market_data::{
    popular_symbols, FetchOutcome, OhlcvBar, PopularSymbol, SeriesOrigin, StockProfile,
};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

const DEFAULT_DAYS: u32 = 30;
const DEFAULT_POPULAR_LIMIT: usize = 10;

/// Shown next to any synthetic series.
const DEGRADED_NOTICE: &str =
    "Reference data: live market data is unavailable, these prices are simulated";

#[derive(Deserialize)]
struct PriceQuery {
    days: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceHistoryResponse {
    symbol: String,
    days: u32,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<&'static str>,
    origin: SeriesOrigin,
    bars: Vec<OhlcvBar>,
}

async fn get_price_history(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<PriceQuery>,
) -> ApiResult<Json<PriceHistoryResponse>> {
    let days = q.days.unwrap_or(DEFAULT_DAYS);
    if days == 0 || days > state.max_lookback_days {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {}",
            state.max_lookback_days
        )));
    }

    let cancel = state.shutdown.child_token();
    let outcome = state
        .market_data
        .fetch_with_cancel(&symbol, days, &cancel)
        .await;

    let series = match outcome {
        FetchOutcome::Live(series) | FetchOutcome::Degraded(series) => series,
        FetchOutcome::Unavailable => {
            return Err(ApiError::NotFound(format!(
                "Data unavailable for {}",
                symbol
            )))
        }
        FetchOutcome::Cancelled => {
            return Err(ApiError::Unavailable(
                "Server is shutting down".to_string(),
            ))
        }
    };

    let degraded = series.is_degraded();
    Ok(Json(PriceHistoryResponse {
        symbol: series.symbol().to_string(),
        days,
        degraded,
        notice: degraded.then_some(DEGRADED_NOTICE),
        origin: series.origin().clone(),
        bars: series.bars().to_vec(),
    }))
}

async fn get_profile(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<StockProfile>> {
    let cancel = state.shutdown.child_token();
    state
        .market_data
        .fetch_profile(&symbol, &cancel)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown symbol {}", symbol)))
}

#[derive(Deserialize)]
struct PopularQuery {
    limit: Option<usize>,
}

async fn list_popular(Query(q): Query<PopularQuery>) -> Json<Vec<PopularSymbol>> {
    Json(popular_symbols(q.limit.unwrap_or(DEFAULT_POPULAR_LIMIT)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/prices/{symbol}", get(get_price_history))
        .route("/profile/{symbol}", get(get_profile))
        .route("/popular", get(list_popular))
}
