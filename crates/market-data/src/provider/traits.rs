//! Market data provider trait definitions.
//!
//! This module defines the adapter contract every upstream source
//! implements. The orchestrator only ever sees this trait, so adding a
//! provider never requires touching fallback policy.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::{Capability, FetchRequest, NormalizedResult};

use super::capabilities::RateLimit;

/// Raw, provider-specific payload as returned by the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPayload(pub Value);

impl RawPayload {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Trait for market data providers.
///
/// Implementations translate transport failures into the three kinds the
/// orchestrator reacts to:
/// - [`MarketDataError::RateLimited`] for throttling (HTTP 429)
/// - [`MarketDataError::AuthExhausted`] for dead credentials or credits (HTTP 401/403)
/// - [`MarketDataError::Transient`] (or `Timeout`/`Parse`) for everything else
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use coinlens_market_data::provider::{MarketDataProvider, RateLimit, RawPayload};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> &'static [Capability] {
///         &[Capability::SpotPrice]
///     }
///
///     // ... implement fetch_raw and parse
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "COINGECKO", "BINANCE", etc.
    /// Used for logging, availability tracking and diagnostics.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = tried first. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    /// Kinds of data this provider can serve.
    fn capabilities(&self) -> &'static [Capability];

    /// Client-side pacing for this provider.
    fn rate_limit(&self) -> RateLimit {
        RateLimit::default()
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Perform the upstream call for a request.
    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, MarketDataError>;

    /// Translate a raw payload into the common result shape.
    fn parse(
        &self,
        request: &FetchRequest,
        raw: RawPayload,
    ) -> Result<NormalizedResult, MarketDataError>;

    /// Fetch and parse in one step.
    async fn fetch(&self, request: &FetchRequest) -> Result<NormalizedResult, MarketDataError> {
        if !self.supports(request.capability) {
            return Err(MarketDataError::UnsupportedCapability {
                provider: self.id().to_string(),
                capability: request.capability,
            });
        }
        let raw = self.fetch_raw(request).await?;
        self.parse(request, raw)
    }
}
