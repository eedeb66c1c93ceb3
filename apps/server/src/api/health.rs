use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::main_lib::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    tiers: Vec<&'static str>,
    in_backoff: bool,
}

/// Liveness plus whether the upstream budget is currently backing off.
async fn healthz(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let limiter = state.market_data.rate_limiter().snapshot();
    Json(HealthResponse {
        status: "ok",
        tiers: state.market_data.tier_ids(),
        in_backoff: limiter.in_backoff,
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/healthz", get(healthz))
}
