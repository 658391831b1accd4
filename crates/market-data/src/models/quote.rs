use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::Symbol;

/// Latest spot price for an asset, quoted in USD.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpotQuote {
    pub symbol: Symbol,
    pub price: f64,

    /// 24h price change in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_24h_pct: Option<f64>,

    /// 24h traded volume in USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_24h: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,

    pub source_provider: String,
    pub timestamp: DateTime<Utc>,
}

impl SpotQuote {
    pub fn new(symbol: impl Into<Symbol>, price: f64, source: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change_24h_pct: None,
            volume_24h: None,
            market_cap: None,
            source_provider: source.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Market-wide totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub total_market_cap_usd: f64,
    pub total_volume_usd: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btc_dominance_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_cryptocurrencies: Option<u64>,
    pub source_provider: String,
    pub timestamp: DateTime<Utc>,
}

/// A single scalar indicator such as the risk-free rate or the fear & greed index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValue {
    pub name: String,
    pub value: f64,
    /// Human readable classification ("Extreme Fear", "3-Month T-Bill", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub source_provider: String,
    pub timestamp: DateTime<Utc>,
}
