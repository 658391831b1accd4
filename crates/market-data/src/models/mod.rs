//! Market data models
//!
//! This module contains the core data types shared by providers, the
//! orchestrator, the cache and the preloader:
//! - `types` - Type aliases for common identifiers (ProviderId, Symbol)
//! - `capability` - What kind of data is requested (Capability)
//! - `request` - Routed requests and their cache keys (FetchRequest)
//! - `series` - Normalized price history (NormalizedSeries, SeriesPoint)
//! - `quote` - Scalar market data (SpotQuote, GlobalMetrics, IndicatorValue)
//! - `result` - The tagged adapter output (NormalizedResult)
//! - `snapshot` - Batch preload output (BatchSnapshot, SymbolSnapshot)

mod capability;
mod quote;
mod request;
mod result;
mod series;
mod snapshot;
mod types;

pub use capability::Capability;
pub use quote::{GlobalMetrics, IndicatorValue, SpotQuote};
pub use request::{normalize_symbol, FetchRequest, MARKET_SYMBOL};
pub use result::NormalizedResult;
pub use series::{NormalizedSeries, SeriesPoint};
pub use snapshot::{BatchSnapshot, SymbolSnapshot};
pub use types::{ProviderId, Symbol};
