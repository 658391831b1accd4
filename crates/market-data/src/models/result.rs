use serde::{Deserialize, Serialize};

use super::quote::{GlobalMetrics, IndicatorValue, SpotQuote};
use super::series::NormalizedSeries;

/// Common shape every adapter translates its payload into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum NormalizedResult {
    Series(NormalizedSeries),
    Quote(SpotQuote),
    Global(GlobalMetrics),
    Indicator(IndicatorValue),
}

impl NormalizedResult {
    /// Number of data points carried; scalar results count as one.
    pub fn data_points(&self) -> usize {
        match self {
            Self::Series(series) => series.len(),
            Self::Quote(_) | Self::Global(_) | Self::Indicator(_) => 1,
        }
    }

    pub fn source_provider(&self) -> &str {
        match self {
            Self::Series(series) => &series.source_provider,
            Self::Quote(quote) => &quote.source_provider,
            Self::Global(global) => &global.source_provider,
            Self::Indicator(indicator) => &indicator.source_provider,
        }
    }

    pub fn into_series(self) -> Option<NormalizedSeries> {
        match self {
            Self::Series(series) => Some(series),
            _ => None,
        }
    }

    pub fn into_quote(self) -> Option<SpotQuote> {
        match self {
            Self::Quote(quote) => Some(quote),
            _ => None,
        }
    }

    pub fn into_global(self) -> Option<GlobalMetrics> {
        match self {
            Self::Global(global) => Some(global),
            _ => None,
        }
    }

    pub fn into_indicator(self) -> Option<IndicatorValue> {
        match self {
            Self::Indicator(indicator) => Some(indicator),
            _ => None,
        }
    }
}
