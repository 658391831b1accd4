//! Binance public market data provider implementation.
//!
//! Uses the unauthenticated REST endpoints:
//! - /ticker/24hr for spot prices
//! - /klines for daily (`1d`) and hourly (`1h`) candles
//!
//! Prices are quoted against USDT, which is treated as USD.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::{
    Capability, FetchRequest, NormalizedResult, NormalizedSeries, SeriesPoint, SpotQuote,
};
use crate::provider::http::HttpTransport;
use crate::provider::{MarketDataProvider, RateLimit, RawPayload};

const BASE_URL: &str = "https://api.binance.com/api/v3";
const PROVIDER_ID: &str = "BINANCE";
const QUOTE_ASSET: &str = "USDT";
const MAX_KLINES: u32 = 1000;

const CAPABILITIES: &[Capability] = &[
    Capability::SpotPrice,
    Capability::HistoricalSeries,
    Capability::ChartSeries,
];

/// Binance public market data provider.
pub struct BinanceProvider {
    transport: HttpTransport,
    base_url: String,
}

impl BinanceProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            transport: HttpTransport::new(PROVIDER_ID),
            base_url: base_url.into(),
        }
    }

    fn pair(symbol: &str) -> String {
        format!("{}{}", symbol, QUOTE_ASSET)
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(600)
    }

    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, MarketDataError> {
        let pair = Self::pair(&request.symbol);
        let days = request.days_or_default();
        let (url, query) = match request.capability {
            Capability::SpotPrice => (
                format!("{}/ticker/24hr", self.base_url),
                vec![("symbol", pair)],
            ),
            Capability::HistoricalSeries => (
                format!("{}/klines", self.base_url),
                vec![
                    ("symbol", pair),
                    ("interval", "1d".to_string()),
                    ("limit", days.min(MAX_KLINES).to_string()),
                ],
            ),
            Capability::ChartSeries => (
                format!("{}/klines", self.base_url),
                vec![
                    ("symbol", pair),
                    ("interval", "1h".to_string()),
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

        let value = self.transport.get_json(&url, &query, &[]).await?;
        Ok(RawPayload(value))
    }

    fn parse(
        &self,
        request: &FetchRequest,
        raw: RawPayload,
    ) -> Result<NormalizedResult, MarketDataError> {
        let value = raw.into_inner();
        match request.capability {
            Capability::SpotPrice => {
                parse_ticker(&request.symbol, &value).map(NormalizedResult::Quote)
            }
            Capability::HistoricalSeries | Capability::ChartSeries => {
                parse_klines(&request.symbol, &value).map(NormalizedResult::Series)
            }
            other => Err(MarketDataError::UnsupportedCapability {
                provider: PROVIDER_ID.to_string(),
                capability: other,
            }),
        }
    }
}

/// Binance encodes decimals as JSON strings.
fn decimal_field(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn parse_ticker(symbol: &str, value: &Value) -> Result<SpotQuote, MarketDataError> {
    let price = value
        .get("lastPrice")
        .and_then(decimal_field)
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "missing lastPrice"))?;

    let mut quote = SpotQuote::new(symbol, price, PROVIDER_ID);
    quote.change_24h_pct = value.get("priceChangePercent").and_then(decimal_field);
    quote.volume_24h = value.get("quoteVolume").and_then(decimal_field);
    Ok(quote)
}

fn parse_klines(symbol: &str, value: &Value) -> Result<NormalizedSeries, MarketDataError> {
    let rows = value
        .as_array()
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "klines payload is not an array"))?;

    let points = rows
        .iter()
        .filter_map(|row| {
            let open_time = row.get(0).and_then(Value::as_i64)?;
            let close = row.get(4).and_then(decimal_field)?;
            let quote_volume = row.get(7).and_then(decimal_field);
            let timestamp = Utc.timestamp_millis_opt(open_time).single()?;
            Some(SeriesPoint {
                timestamp,
                price: close,
                volume: quote_volume,
            })
        })
        .collect();

    Ok(NormalizedSeries::new(symbol, PROVIDER_ID, points))
}

/// Hourly bars covering `days`, within one request.
fn hourly_limit(days: u32) -> u32 {
    days.saturating_mul(24).min(MAX_KLINES)
}
