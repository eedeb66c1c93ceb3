//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `SeriesProvider` trait that every upstream source implements
//! - `ProviderAdapter`, which turns a provider into one fallback tier
//! - `UserAgentRotator` and the browser header set used for outbound calls
//! - Concrete providers (Yahoo Finance, FinMind)
//!
//! Providers only perform single normalized calls. Pacing, identity
//! rotation, retry and variant ordering live in the adapter, so a new
//! source only has to map its own schema onto [`OhlcvBar`](crate::models::OhlcvBar).

mod adapter;
mod traits;
pub mod user_agent;

pub mod finmind;
pub mod yahoo;

pub use adapter::ProviderAdapter;
pub use traits::{SeriesProvider, SeriesRequest};
pub use user_agent::UserAgentRotator;
