use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use twstock_market_data::{CacheStats, FetchStats};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<FetchStats> {
    Json(state.market_data.get_stats())
}

async fn reset_stats(State(state): State<Arc<AppState>>) -> StatusCode {
    state.market_data.reset_stats();
    StatusCode::NO_CONTENT
}

async fn get_cache_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<CacheStats>> {
    state
        .market_data
        .cache_stats()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Cache is disabled".to_string()))
}

async fn clear_cache(State(state): State<Arc<AppState>>) -> StatusCode {
    state.market_data.clear_cache();
    StatusCode::NO_CONTENT
}

#[derive(serde::Deserialize)]
struct InvalidateQuery {
    days: u32,
}

async fn invalidate_entry(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(q): Query<InvalidateQuery>,
) -> ApiResult<StatusCode> {
    if state.market_data.invalidate(&symbol, q.days) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "No cached entry for {}:{}",
            symbol, q.days
        )))
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/stats/reset", post(reset_stats))
        .route("/cache", get(get_cache_stats).delete(clear_cache))
        .route("/cache/{symbol}", delete(invalidate_entry))
}
