use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quote::{GlobalMetrics, IndicatorValue, SpotQuote};
use super::series::NormalizedSeries;
use super::types::Symbol;

/// Everything preloaded for a single symbol.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub quote: Option<SpotQuote>,
    pub history: Option<NormalizedSeries>,
    pub chart: Option<NormalizedSeries>,
    pub cached_at: Option<DateTime<Utc>>,
}

impl SymbolSnapshot {
    /// True when none of the data classes could be fetched.
    pub fn is_empty(&self) -> bool {
        self.quote.is_none() && self.history.is_none() && self.chart.is_none()
    }
}

/// Composite preload result for the whole symbol universe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSnapshot {
    pub symbols: BTreeMap<Symbol, SymbolSnapshot>,
    pub global_metrics: Option<GlobalMetrics>,
    pub risk_free_rate: Option<IndicatorValue>,
    pub fear_greed_index: Option<IndicatorValue>,
    pub timestamp: DateTime<Utc>,
}

impl BatchSnapshot {
    pub fn new() -> Self {
        Self {
            symbols: BTreeMap::new(),
            global_metrics: None,
            risk_free_rate: None,
            fear_greed_index: None,
            timestamp: Utc::now(),
        }
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolSnapshot> {
        self.symbols.get(symbol)
    }

    pub fn quote(&self, symbol: &str) -> Option<&SpotQuote> {
        self.symbols.get(symbol).and_then(|s| s.quote.as_ref())
    }

    /// True when nothing at all was loaded.
    pub fn is_empty(&self) -> bool {
        self.symbols.values().all(SymbolSnapshot::is_empty)
            && self.global_metrics.is_none()
            && self.risk_free_rate.is_none()
            && self.fear_greed_index.is_none()
    }
}

impl Default for BatchSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
