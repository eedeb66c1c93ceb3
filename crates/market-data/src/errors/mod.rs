//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`RetryClass`]: Classification for determining retry behavior
//!
//! None of these errors escape [`FallbackOrchestrator::fetch`](crate::FallbackOrchestrator::fetch);
//! they are consumed inside the adapters and turned into EMPTY tiers.

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how a provider adapter handles the error.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The upstream answered with a 5xx status.
    #[error("Service unavailable: {provider} returned HTTP {status}")]
    ServiceUnavailable {
        /// The provider that failed
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// Upstream reachable but returned no rows for the symbol/window.
    #[error("No data: {provider} returned no rows for {symbol}")]
    NoData {
        /// The provider that returned nothing
        provider: String,
        /// The provider-specific symbol that was queried
        symbol: String,
    },

    /// Response shape was not what the provider normally returns.
    #[error("Schema error: {provider} - {message}")]
    Schema {
        /// The provider whose response could not be normalized
        provider: String,
        /// What was wrong with the payload
        message: String,
    },

    /// Data validation failed.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// A provider-specific error occurred (non-429 HTTP status, auth failure...).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The caller abandoned the fetch.
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration could not be loaded or is inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use twstock_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::Cancelled;
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient errors - retry with backoff
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::Network(_)
            | Self::ServiceUnavailable { .. } => RetryClass::WithBackoff,

            // Upstream answered but this variant is useless
            Self::NoData { .. } | Self::Schema { .. } | Self::ValidationFailed { .. } => {
                RetryClass::NextVariant
            }

            Self::ProviderError { .. } => RetryClass::NextProvider,

            Self::Cancelled | Self::Config(_) => RetryClass::Never,
        }
    }

    /// True when the upstream explicitly signalled throttling.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Maps a non-success HTTP status onto the taxonomy.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, symbol: &str) -> Self {
        match status.as_u16() {
            429 => Self::RateLimited {
                provider: provider.to_string(),
            },
            404 => Self::NoData {
                provider: provider.to_string(),
                symbol: symbol.to_string(),
            },
            code if status.is_server_error() => Self::ServiceUnavailable {
                provider: provider.to_string(),
                status: code,
            },
            code => Self::ProviderError {
                provider: provider.to_string(),
                message: format!("HTTP {}", code),
            },
        }
    }

    /// Maps a reqwest failure onto the taxonomy, keeping timeouts distinct.
    pub fn from_request(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
            }
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            Self::RateLimited {
                provider: provider.to_string(),
            }
        } else {
            Self::Network(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_retries_with_backoff() {
        let error = MarketDataError::RateLimited {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
        assert!(error.is_rate_limited());
    }

    #[test]
    fn test_timeout_retries_with_backoff() {
        let error = MarketDataError::Timeout {
            provider: "FINMIND".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
        assert!(!error.is_rate_limited());
    }

    #[test]
    fn test_no_data_moves_to_next_variant() {
        let error = MarketDataError::NoData {
            provider: "YAHOO".to_string(),
            symbol: "9999.TW".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextVariant);
    }

    #[test]
    fn test_schema_error_moves_to_next_variant() {
        let error = MarketDataError::Schema {
            provider: "FINMIND".to_string(),
            message: "missing field `close`".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextVariant);
    }

    #[test]
    fn test_provider_error_tries_next_provider() {
        let error = MarketDataError::ProviderError {
            provider: "YAHOO".to_string(),
            message: "HTTP 500".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_from_status_classification() {
        use reqwest::StatusCode;

        let err = MarketDataError::from_status("YAHOO", StatusCode::TOO_MANY_REQUESTS, "2330.TW");
        assert!(err.is_rate_limited());

        let err = MarketDataError::from_status("YAHOO", StatusCode::NOT_FOUND, "9999.TW");
        assert!(matches!(err, MarketDataError::NoData { ref symbol, .. } if symbol == "9999.TW"));

        let err = MarketDataError::from_status("YAHOO", StatusCode::BAD_GATEWAY, "2330.TW");
        assert_eq!(err.retry_class(), RetryClass::WithBackoff);

        let err = MarketDataError::from_status("YAHOO", StatusCode::FORBIDDEN, "2330.TW");
        assert_eq!(err.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_cancelled_and_config_never_retry() {
        assert_eq!(MarketDataError::Cancelled.retry_class(), RetryClass::Never);
        assert_eq!(
            MarketDataError::Config("timeout must be positive".to_string()).retry_class(),
            RetryClass::Never
        );
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::RateLimited {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(format!("{}", error), "Rate limited: YAHOO");

        let error = MarketDataError::NoData {
            provider: "FINMIND".to_string(),
            symbol: "9999".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "No data: FINMIND returned no rows for 9999"
        );

        let error = MarketDataError::ProviderError {
            provider: "YAHOO".to_string(),
            message: "HTTP 503".to_string(),
        };
        assert_eq!(format!("{}", error), "Provider error: YAHOO - HTTP 503");
    }
}
