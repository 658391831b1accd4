//! Batch preloader.
//!
//! Walks a symbol universe through the orchestrator on a schedule and stores
//! one composite [`BatchSnapshot`] under [`BATCH_SNAPSHOT_KEY`]. Consumers read
//! the snapshot instead of calling providers live.
//!
//! Symbols are processed sequentially. Pacing across shared provider limits
//! depends on it.

mod pacing;
mod scheduler;

pub use pacing::{batch_delay, inter_call_delay, should_pause, PacingConfig, PacingState};
pub use scheduler::{spawn_scheduler, PreloadSchedule};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::models::{BatchSnapshot, Capability, FetchRequest, NormalizedResult, SymbolSnapshot};
use crate::registry::FallbackOrchestrator;

/// Well-known cache key of the composite snapshot.
pub const BATCH_SNAPSHOT_KEY: &str = "batch:preload_all_market_data";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreloadError {
    #[error("A preload run is already in progress")]
    AlreadyRunning,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PreloadConfig {
    /// Lookback for the daily history of each symbol.
    pub history_days: u32,
    /// Lookback for the hourly chart of each symbol.
    pub chart_days: u32,
    pub pacing: PacingConfig,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            history_days: 90,
            chart_days: 7,
            pacing: PacingConfig::default(),
        }
    }
}

/// Summary of one preload run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PreloadReport {
    pub symbols_total: usize,
    pub symbols_loaded: usize,
    /// Symbols for which nothing at all could be fetched.
    pub symbols_failed: Vec<String>,
    pub calls_succeeded: usize,
    pub calls_failed: usize,
    pub rate_limit_events: usize,
    pub pauses: usize,
    pub snapshot_cached: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,
}

/// Marks a run in progress; cleared on drop, including on panic or cancellation.
struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn try_acquire(running: &'a AtomicBool) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { running })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

pub struct BatchPreloader {
    orchestrator: Arc<FallbackOrchestrator>,
    config: PreloadConfig,
    running: AtomicBool,
}

impl BatchPreloader {
    pub fn new(orchestrator: Arc<FallbackOrchestrator>, config: PreloadConfig) -> Self {
        Self {
            orchestrator,
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn orchestrator(&self) -> &Arc<FallbackOrchestrator> {
        &self.orchestrator
    }

    /// Read the cached snapshot if it is still within the batch TTL.
    pub async fn load_snapshot(&self) -> Option<(BatchSnapshot, DateTime<Utc>)> {
        self.orchestrator
            .cache()
            .get_fresh_as::<BatchSnapshot>(BATCH_SNAPSHOT_KEY)
            .await
    }

    /// Preload every symbol and cache the composite snapshot.
    ///
    /// Fails only when another run is already in progress.
    pub async fn preload_all(&self, symbols: &[String]) -> Result<PreloadReport, PreloadError> {
        let _guard = RunGuard::try_acquire(&self.running).ok_or(PreloadError::AlreadyRunning)?;

        let started = Instant::now();
        let mut report = PreloadReport {
            symbols_total: symbols.len(),
            started_at: Some(Utc::now()),
            ..PreloadReport::default()
        };
        let mut pacing = PacingState::default();
        let mut snapshot = BatchSnapshot::new();

        info!("Preloading market data for {} symbols", symbols.len());

        snapshot.global_metrics = self
            .fetch_market(Capability::GlobalMetrics, &mut pacing, &mut report)
            .await
            .and_then(NormalizedResult::into_global);
        snapshot.risk_free_rate = self
            .fetch_market(Capability::RiskFreeRate, &mut pacing, &mut report)
            .await
            .and_then(NormalizedResult::into_indicator);
        snapshot.fear_greed_index = self
            .fetch_market(Capability::FearGreedIndex, &mut pacing, &mut report)
            .await
            .and_then(NormalizedResult::into_indicator);

        let total = symbols.len();
        for (index, symbol) in symbols.iter().enumerate() {
            let counts = self.orchestrator.tracker().counts();
            if should_pause(&self.config.pacing, &counts) {
                warn!(
                    "{}/{} providers unavailable, pausing preload for {:?}",
                    counts.unavailable(),
                    counts.total,
                    self.config.pacing.pause_duration
                );
                report.pauses += 1;
                tokio::time::sleep(self.config.pacing.pause_duration).await;
            }

            let symbol_snapshot = self.preload_symbol(symbol, &mut pacing, &mut report).await;
            if symbol_snapshot.is_empty() {
                warn!("Preload got no data for {}", symbol);
                report.symbols_failed.push(symbol.clone());
            } else {
                report.symbols_loaded += 1;
            }
            snapshot.symbols.insert(symbol.clone(), symbol_snapshot);

            if index + 1 < total {
                let delay = batch_delay(
                    &self.config.pacing,
                    index,
                    total,
                    pacing.consecutive_failures,
                );
                tokio::time::sleep(delay).await;
            }
        }

        snapshot.timestamp = Utc::now();
        if snapshot.is_empty() {
            warn!("Preload produced no data, keeping the previous snapshot");
        } else {
            let ttl = self.orchestrator.ttls().batch;
            self.orchestrator
                .cache()
                .set_as(BATCH_SNAPSHOT_KEY, &snapshot, ttl)
                .await;
            report.snapshot_cached = true;
        }

        report.elapsed = started.elapsed();
        info!(
            "Preload finished: {}/{} symbols, {} calls ok, {} failed, {} rate limits, {} pauses in {:?}",
            report.symbols_loaded,
            report.symbols_total,
            report.calls_succeeded,
            report.calls_failed,
            report.rate_limit_events,
            report.pauses,
            report.elapsed
        );
        Ok(report)
    }

    async fn preload_symbol(
        &self,
        symbol: &str,
        pacing: &mut PacingState,
        report: &mut PreloadReport,
    ) -> SymbolSnapshot {
        let requests = [
            FetchRequest::spot(symbol),
            FetchRequest::historical(symbol, self.config.history_days),
            FetchRequest::chart(symbol, self.config.chart_days),
        ];

        let mut results = Vec::with_capacity(requests.len());
        for (i, request) in requests.iter().enumerate() {
            if i > 0 {
                self.pause_between_calls(pacing).await;
            }
            results.push(self.fetch(request, pacing, report).await);
        }

        let mut results = results.into_iter();
        SymbolSnapshot {
            quote: results.next().flatten().and_then(NormalizedResult::into_quote),
            history: results.next().flatten().and_then(NormalizedResult::into_series),
            chart: results.next().flatten().and_then(NormalizedResult::into_series),
            cached_at: Some(Utc::now()),
        }
    }

    /// Market-wide data, skipped when no provider serves the capability.
    async fn fetch_market(
        &self,
        capability: Capability,
        pacing: &mut PacingState,
        report: &mut PreloadReport,
    ) -> Option<NormalizedResult> {
        if !self
            .orchestrator
            .providers()
            .iter()
            .any(|p| p.supports(capability))
        {
            debug!("No provider for {}, skipping", capability);
            return None;
        }
        let result = self.fetch(&FetchRequest::market(capability), pacing, report).await;
        self.pause_between_calls(pacing).await;
        result
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        pacing: &mut PacingState,
        report: &mut PreloadReport,
    ) -> Option<NormalizedResult> {
        let (result, diagnostics) = self
            .orchestrator
            .fetch_fresh_with_diagnostics(request)
            .await;

        if diagnostics.saw_rate_limit() {
            pacing.record_rate_limit();
            report.rate_limit_events += 1;
        }

        match result {
            Ok(result) => {
                pacing.record_success();
                report.calls_succeeded += 1;
                Some(result)
            }
            Err(e) => {
                debug!("Preload of '{}' failed: {}", request.cache_key(), e);
                report.calls_failed += 1;
                None
            }
        }
    }

    async fn pause_between_calls(&self, pacing: &PacingState) {
        let delay = inter_call_delay(
            &self.config.pacing,
            pacing.consecutive_failures,
            self.orchestrator.tracker().unavailable_ratio(),
        );
        tokio::time::sleep(delay).await;
    }
}
