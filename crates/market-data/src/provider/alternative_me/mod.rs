//! Alternative.me fear & greed index provider.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::{Capability, FetchRequest, IndicatorValue, NormalizedResult};
use crate::provider::http::HttpTransport;
use crate::provider::{MarketDataProvider, RateLimit, RawPayload};

const BASE_URL: &str = "https://api.alternative.me";
const PROVIDER_ID: &str = "ALTERNATIVE_ME";
const INDICATOR_NAME: &str = "fear_greed_index";

const CAPABILITIES: &[Capability] = &[Capability::FearGreedIndex];

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

/// The API returns every field as a string.
#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: Option<String>,
    timestamp: Option<String>,
}

pub struct AlternativeMeProvider {
    transport: HttpTransport,
    base_url: String,
}

impl AlternativeMeProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            transport: HttpTransport::new(PROVIDER_ID),
            base_url: base_url.into(),
        }
    }
}

impl Default for AlternativeMeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for AlternativeMeProvider {
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
        RateLimit::per_minute(60)
    }

    async fn fetch_raw(&self, _request: &FetchRequest) -> Result<RawPayload, MarketDataError> {
        let url = format!("{}/fng/", self.base_url);
        let value = self
            .transport
            .get_json(&url, &[("limit", "1".to_string())], &[])
            .await?;
        Ok(RawPayload(value))
    }

    fn parse(
        &self,
        _request: &FetchRequest,
        raw: RawPayload,
    ) -> Result<NormalizedResult, MarketDataError> {
        parse_fng(raw).map(NormalizedResult::Indicator)
    }
}

fn parse_fng(raw: RawPayload) -> Result<IndicatorValue, MarketDataError> {
    let response: FngResponse = serde_json::from_value(raw.into_inner())
        .map_err(|e| MarketDataError::parse(PROVIDER_ID, e.to_string()))?;

    let entry = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "empty data array"))?;

    let value: f64 = entry
        .value
        .parse()
        .map_err(|_| MarketDataError::parse(PROVIDER_ID, format!("bad value '{}'", entry.value)))?;

    let timestamp = entry
        .timestamp
        .and_then(|t| t.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now);

    Ok(IndicatorValue {
        name: INDICATOR_NAME.to_string(),
        value,
        label: entry.value_classification,
        source_provider: PROVIDER_ID.to_string(),
        timestamp,
    })
}
