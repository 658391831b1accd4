//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use crate::errors::MarketDataError;
use crate::models::{
    Capability, FetchRequest, GlobalMetrics, IndicatorValue, NormalizedResult, NormalizedSeries,
    SeriesPoint, SpotQuote,
};
use crate::provider::{MarketDataProvider, RateLimit, RawPayload};

/// Provider serving canned data for every capability.
pub struct StubProvider {
    id: &'static str,
    priority: u8,
    series_points: usize,
    failure: Mutex<Option<MarketDataError>>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(id: &'static str, priority: u8) -> Self {
        Self {
            id,
            priority,
            series_points: 30,
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail every call with `error` until cleared.
    pub fn failing(self, error: MarketDataError) -> Self {
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    pub fn set_failure(&self, error: Option<MarketDataError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn series(symbol: &str, source: &str, points: usize) -> NormalizedSeries {
    let start = Utc::now() - ChronoDuration::days(points as i64);
    let points = (0..points)
        .map(|i| SeriesPoint::new(start + ChronoDuration::days(i as i64), 100.0 + i as f64))
        .collect();
    NormalizedSeries::new(symbol, source, points)
}

fn canned(id: &str, request: &FetchRequest, series_points: usize) -> NormalizedResult {
    match request.capability {
        Capability::SpotPrice => NormalizedResult::Quote(SpotQuote::new(&request.symbol, 42.0, id)),
        Capability::HistoricalSeries | Capability::ChartSeries => {
            NormalizedResult::Series(series(&request.symbol, id, series_points))
        }
        Capability::GlobalMetrics => NormalizedResult::Global(GlobalMetrics {
            total_market_cap_usd: 2.5e12,
            total_volume_usd: 9.0e10,
            btc_dominance_pct: Some(52.0),
            active_cryptocurrencies: Some(10_000),
            source_provider: id.to_string(),
            timestamp: Utc::now(),
        }),
        Capability::RiskFreeRate | Capability::FearGreedIndex => {
            NormalizedResult::Indicator(IndicatorValue {
                name: request.capability.namespace().to_string(),
                value: 50.0,
                label: None,
                source_provider: id.to_string(),
                timestamp: Utc::now(),
            })
        }
    }
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    fn id(&self) -> &'static str {
        self.id
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn capabilities(&self) -> &'static [Capability] {
        &Capability::ALL
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::unlimited()
    }

    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        let result = canned(self.id, request, self.series_points);
        Ok(RawPayload(serde_json::to_value(result).unwrap()))
    }

    fn parse(
        &self,
        _request: &FetchRequest,
        raw: RawPayload,
    ) -> Result<NormalizedResult, MarketDataError> {
        Ok(serde_json::from_value(raw.into_inner()).unwrap())
    }
}
