//! Tier orchestration for market data providers.
//!
//! This module provides:
//! - Process-wide admission control with 429 backoff
//! - Retry with exponential delay
//! - OHLCV bar validation
//! - Per-tier and per-fetch counters
//! - The fallback orchestrator that ties tiers, cache and synthesis together

mod orchestrator;
mod rate_limiter;
mod retry;
mod stats;
mod validator;

pub use orchestrator::{FallbackOrchestrator, OrchestratorBuilder};
pub use rate_limiter::{RateLimitConfig, RateLimiter, RateLimiterSnapshot};
pub use retry::{RetryConfig, RetryHandler};
pub use stats::{FetchStats, ProviderStats, TierCounters};
pub use validator::{BarValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
