//! Market data service.
//!
//! The facade consumers talk to. It wires providers, the availability
//! tracker, the two-tier cache and the preloader together, and serves reads
//! from the batch snapshot before falling back to live fetches.
//!
//! # Architecture
//!
//! ```text
//! MarketDataService
//!     |
//!     +-- BatchPreloader -------> BATCH_SNAPSHOT_KEY (read first)
//!     |
//!     +-- FallbackOrchestrator
//!             |
//!             +-- AvailabilityTracker
//!             +-- CacheStore (durable + memory)
//!             +-- providers (priority order)
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cache::{CacheHealth, CacheStore, DurableStore};
use crate::config::{MarketDataConfig, RedisConfig};
use crate::errors::MarketDataError;
use crate::models::{
    normalize_symbol, BatchSnapshot, Capability, FetchRequest, GlobalMetrics, IndicatorValue,
    NormalizedResult, NormalizedSeries, SymbolSnapshot,
};
use crate::preloader::{
    spawn_scheduler, BatchPreloader, PreloadError, PreloadReport, PreloadSchedule,
};
use crate::registry::{AvailabilityState, AvailabilityTracker, FallbackOrchestrator};

/// Result of [`MarketDataService::health_check`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub cache: CacheHealth,
    pub providers_available: usize,
    pub providers_total: usize,
    pub preload_running: bool,
}

impl ServiceHealth {
    /// At least one provider can take calls.
    pub fn is_healthy(&self) -> bool {
        self.providers_available > 0
    }
}

pub struct MarketDataService {
    orchestrator: Arc<FallbackOrchestrator>,
    preloader: Arc<BatchPreloader>,
    symbols: Vec<String>,
}

impl MarketDataService {
    pub fn new(
        orchestrator: Arc<FallbackOrchestrator>,
        preloader: Arc<BatchPreloader>,
        symbols: Vec<String>,
    ) -> Self {
        Self {
            orchestrator,
            preloader,
            symbols,
        }
    }

    /// Build the whole stack from configuration.
    ///
    /// An unreachable durable cache is not fatal: the service starts on the
    /// memory tier alone.
    pub async fn from_config(config: &MarketDataConfig) -> Self {
        let durable = connect_durable(&config.redis).await;
        let cache = Arc::new(CacheStore::with_durable(durable));
        let providers = config.build_providers();
        if providers.is_empty() {
            warn!("No market data providers initialized");
        }

        let mut orchestrator = FallbackOrchestrator::new(
            providers,
            Arc::new(AvailabilityTracker::new()),
            cache,
            config.fallback.clone(),
        )
        .with_ttls(config.ttls.clone());
        for (provider, limit) in config.rate_limit_overrides() {
            orchestrator = orchestrator.with_rate_limit(&provider, limit);
        }

        let orchestrator = Arc::new(orchestrator);
        let preloader = Arc::new(BatchPreloader::new(
            orchestrator.clone(),
            config.preload.config.clone(),
        ));
        Self::new(orchestrator, preloader, config.preload.symbols.clone())
    }

    pub fn orchestrator(&self) -> &Arc<FallbackOrchestrator> {
        &self.orchestrator
    }

    pub fn preloader(&self) -> &Arc<BatchPreloader> {
        &self.preloader
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Start periodic preloads of the configured symbols.
    pub fn start_scheduler(&self, schedule: PreloadSchedule) -> JoinHandle<()> {
        spawn_scheduler(self.preloader.clone(), self.symbols.clone(), schedule)
    }

    /// Daily price history for `symbol` over `days`.
    pub async fn fetch(&self, symbol: &str, days: u32) -> Result<NormalizedSeries, MarketDataError> {
        let request = FetchRequest::historical(symbol, days);
        let result = self.orchestrator.fetch(&request).await?;
        expect_kind(result, &request, NormalizedResult::into_series)
    }

    /// Hourly price history for `symbol` over `days`.
    pub async fn fetch_chart(
        &self,
        symbol: &str,
        days: u32,
    ) -> Result<NormalizedSeries, MarketDataError> {
        let request = FetchRequest::chart(symbol, days);
        let result = self.orchestrator.fetch(&request).await?;
        expect_kind(result, &request, NormalizedResult::into_series)
    }

    /// Latest data for `symbol`.
    ///
    /// Served from the batch snapshot when it holds a quote for the symbol,
    /// otherwise read through the cache and providers. A live read carries
    /// the quote only.
    pub async fn get_quote(&self, symbol: &str) -> Result<SymbolSnapshot, MarketDataError> {
        let symbol = normalize_symbol(symbol);
        if let Some((snapshot, _)) = self.preloader.load_snapshot().await {
            if let Some(entry) = snapshot.symbol(&symbol).filter(|s| s.quote.is_some()) {
                return Ok(entry.clone());
            }
        }

        let request = FetchRequest::spot(&symbol);
        let result = self.orchestrator.fetch(&request).await?;
        let quote = expect_kind(result, &request, NormalizedResult::into_quote)?;
        Ok(SymbolSnapshot {
            cached_at: Some(quote.timestamp),
            quote: Some(quote),
            history: None,
            chart: None,
        })
    }

    pub async fn get_global_metrics(&self) -> Result<GlobalMetrics, MarketDataError> {
        if let Some(global) = self.snapshot_field(|s| s.global_metrics).await {
            return Ok(global);
        }
        let request = FetchRequest::market(Capability::GlobalMetrics);
        let result = self.orchestrator.fetch(&request).await?;
        expect_kind(result, &request, NormalizedResult::into_global)
    }

    pub async fn get_risk_free_rate(&self) -> Result<IndicatorValue, MarketDataError> {
        if let Some(rate) = self.snapshot_field(|s| s.risk_free_rate).await {
            return Ok(rate);
        }
        self.fetch_indicator(Capability::RiskFreeRate).await
    }

    pub async fn get_fear_greed_index(&self) -> Result<IndicatorValue, MarketDataError> {
        if let Some(index) = self.snapshot_field(|s| s.fear_greed_index).await {
            return Ok(index);
        }
        self.fetch_indicator(Capability::FearGreedIndex).await
    }

    async fn fetch_indicator(&self, capability: Capability) -> Result<IndicatorValue, MarketDataError> {
        let request = FetchRequest::market(capability);
        let result = self.orchestrator.fetch(&request).await?;
        expect_kind(result, &request, NormalizedResult::into_indicator)
    }

    async fn snapshot_field<T>(
        &self,
        field: impl FnOnce(BatchSnapshot) -> Option<T>,
    ) -> Option<T> {
        self.preloader
            .load_snapshot()
            .await
            .and_then(|(snapshot, _)| field(snapshot))
    }

    /// Drop cached snapshots and quotes, then preload again.
    pub async fn force_refresh(&self) -> Result<PreloadReport, PreloadError> {
        if self.preloader.is_running() {
            return Err(PreloadError::AlreadyRunning);
        }
        let cache = self.orchestrator.cache();
        let removed = cache.clear("batch:*").await + cache.clear("quote:*").await;
        info!("Forced refresh: invalidated {} cache entries", removed);
        self.preloader.preload_all(&self.symbols).await
    }

    pub fn get_status(&self) -> BTreeMap<String, AvailabilityState> {
        self.orchestrator.tracker().get_status()
    }

    /// Put a provider back into rotation. Returns false for unknown ids.
    pub fn reset_provider(&self, provider: &str) -> bool {
        let reset = self.orchestrator.tracker().reset(provider);
        if reset {
            info!("Provider {} reset to available", provider);
        }
        reset
    }

    /// Remove cache entries whose keys match the glob `pattern`.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        self.orchestrator.cache().clear(pattern).await
    }

    pub async fn health_check(&self) -> ServiceHealth {
        let counts = self.orchestrator.tracker().counts();
        ServiceHealth {
            cache: self.orchestrator.cache().health_check().await,
            providers_available: counts.available,
            providers_total: counts.total,
            preload_running: self.preloader.is_running(),
        }
    }
}

fn expect_kind<T>(
    result: NormalizedResult,
    request: &FetchRequest,
    extract: impl FnOnce(NormalizedResult) -> Option<T>,
) -> Result<T, MarketDataError> {
    let source = result.source_provider().to_string();
    extract(result).ok_or_else(|| {
        MarketDataError::parse(
            &source,
            format!("unexpected result kind for {}", request.capability),
        )
    })
}

#[cfg(feature = "redis")]
async fn connect_durable(config: &RedisConfig) -> Option<Arc<dyn DurableStore>> {
    let url = config.connection_url()?;
    match crate::cache::RedisStore::connect(&url).await {
        Ok(store) => {
            info!("Connected to Redis cache");
            Some(Arc::new(store))
        }
        Err(e) => {
            warn!("Redis unavailable, using memory cache only: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "redis"))]
async fn connect_durable(config: &RedisConfig) -> Option<Arc<dyn DurableStore>> {
    if config.is_configured() {
        warn!("Redis configured but built without the redis feature, using memory cache only");
    }
    None
}
