use serde::{Deserialize, Serialize};

use crate::models::Capability;

/// Extra native expiry granted to durable-tier records beyond their TTL, so
/// the read-time freshness check stays authoritative.
pub const SAFETY_BUFFER_SECS: u64 = 60;

/// Cache durations per data class, in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtls {
    pub market_snapshot: u64,
    pub historical: u64,
    pub batch: u64,
    pub risk_free_rate: u64,
    pub fear_greed: u64,
    pub global: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            market_snapshot: 300,
            historical: 86_400,
            batch: 86_400,
            risk_free_rate: 3_600,
            fear_greed: 3_600,
            global: 300,
        }
    }
}

impl CacheTtls {
    pub fn for_capability(&self, capability: Capability) -> u64 {
        match capability {
            Capability::SpotPrice => self.market_snapshot,
            Capability::HistoricalSeries | Capability::ChartSeries => self.historical,
            Capability::GlobalMetrics => self.global,
            Capability::RiskFreeRate => self.risk_free_rate,
            Capability::FearGreedIndex => self.fear_greed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_mapping() {
        let ttls = CacheTtls::default();
        assert_eq!(ttls.for_capability(Capability::HistoricalSeries), 86_400);
        assert_eq!(ttls.for_capability(Capability::ChartSeries), 86_400);
        assert_eq!(ttls.for_capability(Capability::SpotPrice), 300);
        assert_eq!(ttls.for_capability(Capability::RiskFreeRate), 3_600);
    }
}
