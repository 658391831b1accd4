//! CryptoCompare market data provider implementation.
//!
//! Provides spot prices via /pricemultifull and OHLCV history via
//! /v2/histoday (daily) and /v2/histohour (chart). CryptoCompare reports
//! most errors inside an HTTP 200 envelope (`"Response": "Error"`), which the
//! shared transport already classifies.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::{
    Capability, FetchRequest, NormalizedResult, NormalizedSeries, SeriesPoint, SpotQuote,
};
use crate::provider::http::HttpTransport;
use crate::provider::{MarketDataProvider, RateLimit, RawPayload};

const BASE_URL: &str = "https://min-api.cryptocompare.com/data";
const PROVIDER_ID: &str = "CRYPTOCOMPARE";

/// Upper bound the API accepts for the `limit` parameter.
const MAX_LIMIT: u32 = 2000;

const CAPABILITIES: &[Capability] = &[
    Capability::SpotPrice,
    Capability::HistoricalSeries,
    Capability::ChartSeries,
];

#[derive(Debug, Deserialize)]
struct HistoryEnvelope {
    #[serde(rename = "Data")]
    data: HistoryData,
}

#[derive(Debug, Deserialize)]
struct HistoryData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoryBar>,
}

#[derive(Debug, Deserialize)]
struct HistoryBar {
    time: i64,
    close: f64,
    #[serde(default)]
    volumeto: Option<f64>,
}

/// CryptoCompare market data provider.
pub struct CryptoCompareProvider {
    transport: HttpTransport,
    base_url: String,
    api_key: Option<String>,
}

impl CryptoCompareProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            transport: HttpTransport::new(PROVIDER_ID),
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        match &self.api_key {
            Some(key) => vec![("authorization", format!("Apikey {}", key))],
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for CryptoCompareProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(50)
    }

    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, MarketDataError> {
        let headers = self.headers();
        let days = request.days_or_default();
        let (url, query) = match request.capability {
            Capability::SpotPrice => (
                format!("{}/pricemultifull", self.base_url),
                vec![
                    ("fsyms", request.symbol.clone()),
                    ("tsyms", "USD".to_string()),
                ],
            ),
            Capability::HistoricalSeries => (
                format!("{}/v2/histoday", self.base_url),
                vec![
                    ("fsym", request.symbol.clone()),
                    ("tsym", "USD".to_string()),
                    ("limit", days.min(MAX_LIMIT).to_string()),
                ],
            ),
            Capability::ChartSeries => (
                format!("{}/v2/histohour", self.base_url),
                vec![
                    ("fsym", request.symbol.clone()),
                    ("tsym", "USD".to_string()),
                    ("limit", hourly_limit(days).to_string()),
                ],
            ),
            other => {
                return Err(MarketDataError::UnsupportedCapability {
                    provider: PROVIDER_ID.to_string(),
                    capability: other,
                })
            }
        };

        let value = self.transport.get_json(&url, &query, &headers).await?;
        Ok(RawPayload(value))
    }

    fn parse(
        &self,
        request: &FetchRequest,
        raw: RawPayload,
    ) -> Result<NormalizedResult, MarketDataError> {
        let value = raw.into_inner();
        match request.capability {
            Capability::SpotPrice => parse_spot(&request.symbol, &value).map(NormalizedResult::Quote),
            Capability::HistoricalSeries | Capability::ChartSeries => {
                parse_history(&request.symbol, value).map(NormalizedResult::Series)
            }
            other => Err(MarketDataError::UnsupportedCapability {
                provider: PROVIDER_ID.to_string(),
                capability: other,
            }),
        }
    }
}

fn parse_spot(symbol: &str, value: &Value) -> Result<SpotQuote, MarketDataError> {
    let raw = value
        .get("RAW")
        .and_then(|v| v.get(symbol))
        .and_then(|v| v.get("USD"))
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, format!("no RAW entry for {}", symbol)))?;

    let price = raw
        .get("PRICE")
        .and_then(Value::as_f64)
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "missing PRICE"))?;

    let mut quote = SpotQuote::new(symbol, price, PROVIDER_ID);
    quote.change_24h_pct = raw.get("CHANGEPCT24HOUR").and_then(Value::as_f64);
    quote.volume_24h = raw.get("VOLUME24HOURTO").and_then(Value::as_f64);
    quote.market_cap = raw.get("MKTCAP").and_then(Value::as_f64);
    Ok(quote)
}

fn parse_history(symbol: &str, value: Value) -> Result<NormalizedSeries, MarketDataError> {
    let envelope: HistoryEnvelope = serde_json::from_value(value)
        .map_err(|e| MarketDataError::parse(PROVIDER_ID, e.to_string()))?;

    let points = envelope
        .data
        .data
        .into_iter()
        // Bars before the listing date come back as zeros.
        .filter(|bar| bar.close > 0.0)
        .filter_map(|bar| {
            Utc.timestamp_opt(bar.time, 0).single().map(|timestamp| SeriesPoint {
                timestamp,
                price: bar.close,
                volume: bar.volumeto,
            })
        })
        .collect();

    Ok(NormalizedSeries::new(symbol, PROVIDER_ID, points))
}

/// Hourly bars covering `days`, within one request.
fn hourly_limit(days: u32) -> u32 {
    days.saturating_mul(24).min(MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hourly_limit_is_capped() {
        assert_eq!(hourly_limit(7), 168);
        assert_eq!(hourly_limit(365), MAX_LIMIT);
        assert_eq!(hourly_limit(u32::MAX), MAX_LIMIT);
    }

    #[test]
    fn test_parse_spot() {
        let payload = json!({
            "RAW": {"ETH": {"USD": {"PRICE": 3100.0, "CHANGEPCT24HOUR": 2.0, "MKTCAP": 3.7e11}}}
        });
        let quote = parse_spot("ETH", &payload).unwrap();
        assert_eq!(quote.price, 3100.0);
        assert_eq!(quote.market_cap, Some(3.7e11));
        assert_eq!(quote.volume_24h, None);
    }

    #[test]
    fn test_parse_history_skips_zero_bars() {
        let payload = json!({
            "Response": "Success",
            "Data": {
                "Data": [
                    {"time": 1704067200, "close": 0.0, "volumeto": 0.0},
                    {"time": 1704153600, "close": 100.0, "volumeto": 5.0},
                    {"time": 1704240000, "close": 105.0}
                ]
            }
        });
        let series = parse_history("SOL", payload).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.points[0].volume, Some(5.0));
        assert_eq!(series.points[1].volume, None);
    }

    #[test]
    fn test_parse_history_malformed() {
        let err = parse_history("SOL", json!({"Data": "nope"})).unwrap_err();
        assert!(matches!(err, MarketDataError::Parse { .. }));
    }
}
