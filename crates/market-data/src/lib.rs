//! Coinlens Market Data Crate
//!
//! Resilient crypto market data fetching for the Coinlens analytics service.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple providers behind one adapter contract (CoinGecko, CryptoCompare,
//!   Binance, Alternative.me, FRED)
//! - Priority-ordered fallback with per-provider availability tracking
//! - A two-tier TTL cache: Redis when reachable, in-process memory otherwise
//! - Scheduled batch preloading of a symbol universe into one snapshot
//!
//! # Architecture
//!
//! ```text
//! +--------------------+
//! | MarketDataService  |  (facade)
//! +--------------------+
//!      |          |
//!      v          v
//! +----------+  +----------------------+
//! | Batch    |->| FallbackOrchestrator |  (priority order, retries)
//! | Preloader|  +----------------------+
//! +----------+    |        |         |
//!                 v        v         v
//!       +-------------+ +-------+ +-----------+
//!       | Availability| | Cache | | Providers |
//!       | Tracker     | | Store | | (adapters)|
//!       +-------------+ +-------+ +-----------+
//! ```
//!
//! # Core Types
//!
//! - [`FetchRequest`] - Capability, symbol and lookback of one request
//! - [`NormalizedResult`] - Provider-independent adapter output
//! - [`MarketDataError`] - Errors and their [`FailureClass`]
//! - [`AvailabilityTracker`] - Rate-limited and disabled provider states
//! - [`CacheStore`] - Two-tier TTL cache

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod preloader;
pub mod provider;
pub mod registry;
pub mod service;

#[cfg(test)]
mod testing;

// Re-export all public types from models
pub use models::{
    normalize_symbol, BatchSnapshot, Capability, FetchRequest, GlobalMetrics, IndicatorValue,
    NormalizedResult, NormalizedSeries, ProviderId, SeriesPoint, SpotQuote, Symbol,
    SymbolSnapshot, MARKET_SYMBOL,
};

// Re-export error types
pub use errors::{FailureClass, MarketDataError, PUBLIC_UNAVAILABLE_MESSAGE};

// Re-export provider types
pub use provider::alternative_me::AlternativeMeProvider;
pub use provider::binance::BinanceProvider;
pub use provider::coingecko::CoinGeckoProvider;
pub use provider::cryptocompare::CryptoCompareProvider;
pub use provider::fred::FredProvider;
pub use provider::{MarketDataProvider, RateLimit, RawPayload};

// Re-export registry types
pub use registry::{
    AvailabilityCounts, AvailabilityState, AvailabilityTracker, FallbackConfig,
    FallbackOrchestrator, FetchDiagnostics, ProviderAttempt, ProviderState, RateLimiter,
    SkipReason,
};

// Re-export cache types
pub use cache::{
    CacheEntry, CacheError, CacheHealth, CacheStats, CacheStore, CacheTtls, DurableStore,
};
#[cfg(feature = "redis")]
pub use cache::RedisStore;

pub use config::{ConfigError, MarketDataConfig};
pub use preloader::{BatchPreloader, PreloadConfig, PreloadError, PreloadReport, PreloadSchedule};
pub use service::{MarketDataService, ServiceHealth};
