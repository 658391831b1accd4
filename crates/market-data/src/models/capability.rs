use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of data a provider can serve.
///
/// Capabilities double as the routing key for the orchestrator and as the
/// namespace prefix for cache keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Latest spot price with 24h statistics.
    SpotPrice,
    /// Daily price history.
    HistoricalSeries,
    /// Intraday (hourly) price history used for charting.
    ChartSeries,
    /// Market-wide totals (capitalization, volume, dominance).
    GlobalMetrics,
    /// Short-term treasury yield used as the risk-free rate.
    RiskFreeRate,
    /// Crypto fear & greed sentiment index.
    FearGreedIndex,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::SpotPrice,
        Capability::HistoricalSeries,
        Capability::ChartSeries,
        Capability::GlobalMetrics,
        Capability::RiskFreeRate,
        Capability::FearGreedIndex,
    ];

    /// Cache namespace for results of this capability.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::SpotPrice => "quote",
            Self::HistoricalSeries => "historical",
            Self::ChartSeries => "chart",
            Self::GlobalMetrics => "global",
            Self::RiskFreeRate => "risk_free_rate",
            Self::FearGreedIndex => "fear_greed",
        }
    }

    /// Whether results are time series that must satisfy the minimum
    /// data point threshold.
    pub fn is_series(&self) -> bool {
        matches!(self, Self::HistoricalSeries | Self::ChartSeries)
    }

    /// Whether the request is keyed by an asset symbol.
    pub fn is_per_symbol(&self) -> bool {
        matches!(
            self,
            Self::SpotPrice | Self::HistoricalSeries | Self::ChartSeries
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SpotPrice => "spot_price",
            Self::HistoricalSeries => "historical_series",
            Self::ChartSeries => "chart_series",
            Self::GlobalMetrics => "global_metrics",
            Self::RiskFreeRate => "risk_free_rate",
            Self::FearGreedIndex => "fear_greed_index",
        };
        f.write_str(name)
    }
}
