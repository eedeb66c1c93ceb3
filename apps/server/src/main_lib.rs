use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};
use twstock_market_data::FallbackOrchestrator;

use crate::config::Config;

pub struct AppState {
    pub market_data: Arc<FallbackOrchestrator>,
    /// Cancelled on shutdown; every fetch runs under a child token.
    pub shutdown: CancellationToken,
    pub max_lookback_days: u32,
}

impl AppState {
    pub fn new(market_data: Arc<FallbackOrchestrator>, max_lookback_days: u32) -> Arc<Self> {
        Arc::new(Self {
            market_data,
            shutdown: CancellationToken::new(),
            max_lookback_days,
        })
    }
}

pub fn init_tracing() {
    let log_format = std::env::var("TWSTOCK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let orchestrator = FallbackOrchestrator::from_config(&config.market_data)?;
    tracing::info!(
        "Market data tiers: {:?} (cache {}, synthetic {})",
        orchestrator.tier_ids(),
        if config.market_data.cache.enabled { "on" } else { "off" },
        if config.market_data.synthetic.enabled { "on" } else { "off" },
    );
    Ok(AppState::new(
        Arc::new(orchestrator),
        config.max_lookback_days,
    ))
}
