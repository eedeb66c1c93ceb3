use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use twstock_market_data::{MarketDataConfig, MAX_LOOKBACK_DAYS};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8088";
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Server settings, read from `TWSTOCK_*` environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Empty means any origin.
    pub cors_allow_origins: Vec<String>,
    pub cache_cleanup_interval: Duration,
    /// Largest `days` a client may request, capped at [`MAX_LOOKBACK_DAYS`].
    pub max_lookback_days: u32,
    pub market_data: MarketDataConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = std::env::var("TWSTOCK_LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .context("TWSTOCK_LISTEN_ADDR must be a socket address")?;

        let cors_allow_origins = std::env::var("TWSTOCK_CORS_ALLOW_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty() && *origin != "*")
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let cleanup_secs = match std::env::var("TWSTOCK_CACHE_CLEANUP_INTERVAL") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .context("TWSTOCK_CACHE_CLEANUP_INTERVAL must be whole seconds")?,
            Err(_) => DEFAULT_CLEANUP_INTERVAL_SECS,
        };

        let max_lookback_days = match std::env::var("TWSTOCK_MAX_LOOKBACK_DAYS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .context("TWSTOCK_MAX_LOOKBACK_DAYS must be a positive integer")?
                .min(MAX_LOOKBACK_DAYS),
            Err(_) => MAX_LOOKBACK_DAYS,
        };

        let market_data = MarketDataConfig::from_env()?;

        Ok(Self {
            listen_addr,
            cors_allow_origins,
            cache_cleanup_interval: Duration::from_secs(cleanup_secs.max(1)),
            max_lookback_days,
            market_data,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8088)),
            cors_allow_origins: Vec::new(),
            cache_cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            max_lookback_days: MAX_LOOKBACK_DAYS,
            market_data: MarketDataConfig::default(),
        }
    }
}
