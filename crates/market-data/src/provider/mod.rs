//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all adapters implement
//! - Client-side pacing configuration (`RateLimit`)
//! - The shared HTTP transport that classifies upstream failures
//! - Concrete adapters (CoinGecko, CryptoCompare, Binance, Alternative.me, FRED)
//!
//! Adapters only translate payloads and errors. Ordering, fallback and
//! availability tracking live in the registry module, so adding a provider
//! never touches fallback policy.

mod capabilities;
pub mod http;
mod traits;

pub mod alternative_me;
pub mod binance;
pub mod coingecko;
pub mod cryptocompare;
pub mod fred;

pub use capabilities::RateLimit;
pub use traits::{MarketDataProvider, RawPayload};
