use serde::{Deserialize, Serialize};

use super::capability::Capability;
use super::types::Symbol;

/// Symbol used for market-wide requests that are not tied to an asset.
pub const MARKET_SYMBOL: &str = "MARKET";

/// A single logical data request routed through the orchestrator.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Upper-cased asset symbol, or [`MARKET_SYMBOL`] for market-wide data.
    pub symbol: Symbol,
    /// What kind of data is requested.
    pub capability: Capability,
    /// Lookback window in days for series requests.
    pub days: Option<u32>,
}

impl FetchRequest {
    pub fn spot(symbol: &str) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            capability: Capability::SpotPrice,
            days: None,
        }
    }

    pub fn historical(symbol: &str, days: u32) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            capability: Capability::HistoricalSeries,
            days: Some(days),
        }
    }

    pub fn chart(symbol: &str, days: u32) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            capability: Capability::ChartSeries,
            days: Some(days),
        }
    }

    pub fn market(capability: Capability) -> Self {
        Self {
            symbol: MARKET_SYMBOL.to_string(),
            capability,
            days: None,
        }
    }

    /// Lookback window, defaulting to a single day for non-series requests.
    pub fn days_or_default(&self) -> u32 {
        self.days.unwrap_or(1).max(1)
    }

    /// Cache key in `"<namespace>:<SYMBOL>[:<days>]"` form.
    ///
    /// ```
    /// use coinlens_market_data::FetchRequest;
    ///
    /// assert_eq!(FetchRequest::historical("btc", 90).cache_key(), "historical:BTC:90");
    /// assert_eq!(FetchRequest::spot("eth").cache_key(), "quote:ETH");
    /// ```
    pub fn cache_key(&self) -> String {
        let namespace = self.capability.namespace();
        let subject = if self.capability.is_per_symbol() {
            self.symbol.as_str()
        } else {
            "market"
        };
        match self.days {
            Some(days) => format!("{}:{}:{}", namespace, subject, days),
            None => format!("{}:{}", namespace, subject),
        }
    }
}

/// Trim and upper-case a user supplied ticker.
pub fn normalize_symbol(symbol: &str) -> Symbol {
    symbol.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys() {
        assert_eq!(
            FetchRequest::historical("BTC", 90).cache_key(),
            "historical:BTC:90"
        );
        assert_eq!(FetchRequest::chart(" sol ", 7).cache_key(), "chart:SOL:7");
        assert_eq!(FetchRequest::spot("eth").cache_key(), "quote:ETH");
        assert_eq!(
            FetchRequest::market(Capability::GlobalMetrics).cache_key(),
            "global:market"
        );
        assert_eq!(
            FetchRequest::market(Capability::FearGreedIndex).cache_key(),
            "fear_greed:market"
        );
    }

    #[test]
    fn test_days_default() {
        assert_eq!(FetchRequest::spot("BTC").days_or_default(), 1);
        assert_eq!(FetchRequest::historical("BTC", 0).days_or_default(), 1);
        assert_eq!(FetchRequest::historical("BTC", 30).days_or_default(), 30);
    }
}
