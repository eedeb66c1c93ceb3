//! Configuration surface for the acquisition layer.
//!
//! Options are grouped the way the dashboard settings name them
//! (`cache.default_ttl`, `api.max_retries`, ...). Loading order is
//! defaults, then an optional JSON file, then environment overrides.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;
use crate::registry::{RateLimitConfig, RetryConfig, ValidatorConfig};

/// Path of an optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "TWSTOCK_CONFIG";

/// Converts a seconds value to a `Duration`, clamping garbage to zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Toggles the TTL cache entirely
    pub enabled: bool,
    /// Seconds before a live entry expires
    pub default_ttl: u64,
    /// Seconds before a synthetic (degraded) entry expires
    pub degraded_ttl: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: 300,
            degraded_ttl: 60,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Retry budget per provider call
    pub max_retries: u32,
    /// Base retry delay in seconds
    pub retry_delay: f64,
    /// Upper bound on a single retry delay in seconds
    pub max_retry_delay: f64,
    /// Per-request network timeout in seconds
    pub timeout: u64,
    /// Admissions allowed per rate-limit window
    pub max_concurrent_requests: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: 2.0,
            max_retry_delay: 60.0,
            timeout: 10,
            max_concurrent_requests: 5,
        }
    }
}

/// Pacing and backoff, all in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub time_window: f64,
    pub min_delay: f64,
    pub max_delay: f64,
    pub base_backoff: f64,
    pub max_backoff: f64,
    /// Quiet period after which the consecutive 429 count starts over
    pub reset_window: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            time_window: 60.0,
            min_delay: 2.0,
            max_delay: 5.0,
            base_backoff: 60.0,
            max_backoff: 600.0,
            reset_window: 3600.0,
        }
    }
}

/// How outbound calls pick a User-Agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAgentStrategy {
    #[default]
    Random,
    RoundRobin,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub yahoo_enabled: bool,
    pub finmind_enabled: bool,
    /// Optional FinMind API token (raises the free quota)
    pub finmind_token: Option<String>,
    pub user_agent_strategy: UserAgentStrategy,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            yahoo_enabled: true,
            finmind_enabled: true,
            finmind_token: None,
            user_agent_strategy: UserAgentStrategy::Random,
        }
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("yahoo_enabled", &self.yahoo_enabled)
            .field("finmind_enabled", &self.finmind_enabled)
            .field(
                "finmind_token",
                &self.finmind_token.as_ref().map(|_| "<redacted>"),
            )
            .field("user_agent_strategy", &self.user_agent_strategy)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSettings {
    /// When false, total provider failure yields `Unavailable`
    pub enabled: bool,
}

impl Default for SyntheticSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Checks applied to provider bars before they are accepted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Log a warning for zero-volume sessions (the bar is still kept)
    pub warn_on_zero_volume: bool,
}

/// Complete configuration for the acquisition layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub cache: CacheSettings,
    pub api: ApiSettings,
    pub rate_limit: RateLimitSettings,
    pub providers: ProviderSettings,
    pub synthetic: SyntheticSettings,
    pub validation: ValidationSettings,
}

impl MarketDataConfig {
    /// Parses a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, MarketDataError> {
        serde_json::from_str(json).map_err(|e| MarketDataError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MarketDataError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| MarketDataError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    /// Defaults, then `TWSTOCK_CONFIG` if set, then environment overrides.
    pub fn from_env() -> Result<Self, MarketDataError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                debug!("Loading market data config from {}", path);
                Self::from_file(path.trim())?
            }
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `TWSTOCK_*` and `FINMIND_TOKEN` variables on top of `self`.
    pub fn apply_env_overrides(&mut self) -> Result<(), MarketDataError> {
        if let Some(v) = env_parse("TWSTOCK_CACHE_ENABLED")? {
            self.cache.enabled = v;
        }
        if let Some(v) = env_parse("TWSTOCK_CACHE_DEFAULT_TTL")? {
            self.cache.default_ttl = v;
        }
        if let Some(v) = env_parse("TWSTOCK_API_MAX_RETRIES")? {
            self.api.max_retries = v;
        }
        if let Some(v) = env_parse("TWSTOCK_API_RETRY_DELAY")? {
            self.api.retry_delay = v;
        }
        if let Some(v) = env_parse("TWSTOCK_API_TIMEOUT")? {
            self.api.timeout = v;
        }
        if let Some(v) = env_parse("TWSTOCK_API_MAX_CONCURRENT_REQUESTS")? {
            self.api.max_concurrent_requests = v;
        }
        if let Some(v) = env_parse("TWSTOCK_WARN_ON_ZERO_VOLUME")? {
            self.validation.warn_on_zero_volume = v;
        }
        if let Ok(token) = std::env::var("FINMIND_TOKEN") {
            let token = token.trim();
            if !token.is_empty() {
                self.providers.finmind_token = Some(token.to_string());
            }
        }
        Ok(())
    }

    /// Rejects values the limiter and HTTP clients cannot work with.
    pub fn validate(&self) -> Result<(), MarketDataError> {
        let rl = &self.rate_limit;
        if self.api.max_concurrent_requests == 0 {
            return Err(MarketDataError::Config(
                "api.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.api.timeout == 0 {
            return Err(MarketDataError::Config(
                "api.timeout must be positive".to_string(),
            ));
        }
        let seconds = [
            ("api.retry_delay", self.api.retry_delay),
            ("api.max_retry_delay", self.api.max_retry_delay),
            ("rate_limit.time_window", rl.time_window),
            ("rate_limit.min_delay", rl.min_delay),
            ("rate_limit.max_delay", rl.max_delay),
            ("rate_limit.base_backoff", rl.base_backoff),
            ("rate_limit.max_backoff", rl.max_backoff),
            ("rate_limit.reset_window", rl.reset_window),
        ];
        if let Some((name, _)) = seconds.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(MarketDataError::Config(format!(
                "{} must be a non-negative number of seconds",
                name
            )));
        }
        if rl.min_delay > rl.max_delay {
            return Err(MarketDataError::Config(format!(
                "rate_limit.min_delay ({}) exceeds rate_limit.max_delay ({})",
                rl.min_delay, rl.max_delay
            )));
        }
        if rl.base_backoff > rl.max_backoff {
            return Err(MarketDataError::Config(format!(
                "rate_limit.base_backoff ({}) exceeds rate_limit.max_backoff ({})",
                rl.base_backoff, rl.max_backoff
            )));
        }
        Ok(())
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let rl = &self.rate_limit;
        RateLimitConfig {
            max_requests: self.api.max_concurrent_requests,
            time_window: secs(rl.time_window),
            min_delay: secs(rl.min_delay),
            max_delay: secs(rl.max_delay),
            base_backoff: secs(rl.base_backoff),
            max_backoff: secs(rl.max_backoff),
            reset_window: secs(rl.reset_window),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.api.max_retries,
            base_delay: secs(self.api.retry_delay),
            max_delay: secs(self.api.max_retry_delay),
            ..RetryConfig::default()
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        ValidatorConfig {
            warn_on_zero_volume: self.validation.warn_on_zero_volume,
            ..ValidatorConfig::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.default_ttl)
    }

    pub fn degraded_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.degraded_ttl)
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, MarketDataError>
where
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| MarketDataError::Config(format!("{}={:?}: {}", name, raw, e))),
        _ => Ok(None),
    }
}
