//! FRED (Federal Reserve Economic Data) risk-free rate provider.
//!
//! Reads the most recent 3-month treasury bill yield (series `DGS3MO`).
//! FRED publishes "." for days without an observation; those are skipped.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Capability, FetchRequest, IndicatorValue, NormalizedResult};
use crate::provider::http::HttpTransport;
use crate::provider::{MarketDataProvider, RateLimit, RawPayload};

const BASE_URL: &str = "https://api.stlouisfed.org/fred";
const PROVIDER_ID: &str = "FRED";
const SERIES_ID: &str = "DGS3MO";
const INDICATOR_NAME: &str = "risk_free_rate";

const CAPABILITIES: &[Capability] = &[Capability::RiskFreeRate];

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

pub struct FredProvider {
    transport: HttpTransport,
    base_url: String,
    api_key: String,
}

impl FredProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            transport: HttpTransport::new(PROVIDER_ID),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for FredProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        5
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(120)
    }

    async fn fetch_raw(&self, _request: &FetchRequest) -> Result<RawPayload, MarketDataError> {
        let url = format!("{}/series/observations", self.base_url);
        let query = [
            ("series_id", SERIES_ID.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
            ("sort_order", "desc".to_string()),
            ("limit", "10".to_string()),
        ];
        let value = self.transport.get_json(&url, &query, &[]).await?;
        Ok(RawPayload(value))
    }

    fn parse(
        &self,
        _request: &FetchRequest,
        raw: RawPayload,
    ) -> Result<NormalizedResult, MarketDataError> {
        parse_observations(raw).map(NormalizedResult::Indicator)
    }
}

fn parse_observations(raw: RawPayload) -> Result<IndicatorValue, MarketDataError> {
    let response: ObservationsResponse = serde_json::from_value(raw.into_inner())
        .map_err(|e| MarketDataError::parse(PROVIDER_ID, e.to_string()))?;

    // Observations arrive newest first.
    let (date, value) = response
        .observations
        .iter()
        .find_map(|obs| obs.value.parse::<f64>().ok().map(|v| (obs.date.as_str(), v)))
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "no numeric observation"))?;

    let timestamp = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(Utc::now);

    Ok(IndicatorValue {
        name: INDICATOR_NAME.to_string(),
        value,
        label: Some("3-Month Treasury Bill".to_string()),
        source_provider: PROVIDER_ID.to_string(),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_skips_missing_observations() {
        let raw = RawPayload(json!({
            "observations": [
                {"date": "2024-01-02", "value": "."},
                {"date": "2024-01-01", "value": "5.37"}
            ]
        }));
        let indicator = parse_observations(raw).unwrap();
        assert_eq!(indicator.value, 5.37);
        assert_eq!(indicator.timestamp.date_naive().to_string(), "2024-01-01");
    }

    #[test]
    fn test_parse_no_numeric_value() {
        let raw = RawPayload(json!({"observations": [{"date": "2024-01-02", "value": "."}]}));
        assert!(parse_observations(raw).is_err());
    }
}
