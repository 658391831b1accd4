//! CoinGecko market data provider implementation.
//!
//! This module provides market data from the CoinGecko API:
//! - Spot prices via /simple/price
//! - Daily and hourly history via /coins/{id}/market_chart
//! - Market-wide totals via /global
//!
//! The public (demo) tier allows roughly 30 calls per minute.
//! API documentation: https://docs.coingecko.com/reference/introduction

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::errors::MarketDataError;
use crate::models::{
    Capability, FetchRequest, GlobalMetrics, NormalizedResult, NormalizedSeries, SeriesPoint,
    SpotQuote,
};
use crate::provider::http::HttpTransport;
use crate::provider::{MarketDataProvider, RateLimit, RawPayload};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const PROVIDER_ID: &str = "COINGECKO";

const CAPABILITIES: &[Capability] = &[
    Capability::SpotPrice,
    Capability::HistoricalSeries,
    Capability::ChartSeries,
    Capability::GlobalMetrics,
];

/// Map a ticker to CoinGecko's coin id.
pub fn coin_id(symbol: &str) -> String {
    let id = match symbol {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "SOL" => "solana",
        "BNB" => "binancecoin",
        "XRP" => "ripple",
        "ADA" => "cardano",
        "DOGE" => "dogecoin",
        "AVAX" => "avalanche-2",
        "DOT" => "polkadot",
        "LINK" => "chainlink",
        "MATIC" | "POL" => "matic-network",
        "LTC" => "litecoin",
        "TRX" => "tron",
        "ATOM" => "cosmos",
        "UNI" => "uniswap",
        "USDT" => "tether",
        "USDC" => "usd-coin",
        other => return other.to_ascii_lowercase(),
    };
    id.to_string()
}

/// CoinGecko market data provider.
pub struct CoinGeckoProvider {
    transport: HttpTransport,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    /// Create a provider against the public API. The demo key is optional.
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
            Some(key) => vec![("x-cg-demo-api-key", key.clone())],
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
    }

    fn capabilities(&self) -> &'static [Capability] {
        CAPABILITIES
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(30)
    }

    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, MarketDataError> {
        let headers = self.headers();
        let value = match request.capability {
            Capability::SpotPrice => {
                let url = format!("{}/simple/price", self.base_url);
                let query = [
                    ("ids", coin_id(&request.symbol)),
                    ("vs_currencies", "usd".to_string()),
                    ("include_24hr_change", "true".to_string()),
                    ("include_24hr_vol", "true".to_string()),
                    ("include_market_cap", "true".to_string()),
                ];
                self.transport.get_json(&url, &query, &headers).await?
            }
            Capability::HistoricalSeries | Capability::ChartSeries => {
                let url = format!(
                    "{}/coins/{}/market_chart",
                    self.base_url,
                    urlencoding::encode(&coin_id(&request.symbol))
                );
                let mut query = vec![
                    ("vs_currency", "usd".to_string()),
                    ("days", request.days_or_default().to_string()),
                ];
                if request.capability == Capability::HistoricalSeries {
                    query.push(("interval", "daily".to_string()));
                }
                self.transport.get_json(&url, &query, &headers).await?
            }
            Capability::GlobalMetrics => {
                let url = format!("{}/global", self.base_url);
                self.transport.get_json(&url, &[], &headers).await?
            }
            other => {
                return Err(MarketDataError::UnsupportedCapability {
                    provider: PROVIDER_ID.to_string(),
                    capability: other,
                })
            }
        };
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
                parse_market_chart(&request.symbol, &value).map(NormalizedResult::Series)
            }
            Capability::GlobalMetrics => parse_global(&value).map(NormalizedResult::Global),
            other => Err(MarketDataError::UnsupportedCapability {
                provider: PROVIDER_ID.to_string(),
                capability: other,
            }),
        }
    }
}

fn parse_spot(symbol: &str, value: &Value) -> Result<SpotQuote, MarketDataError> {
    let entry = value
        .get(coin_id(symbol))
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, format!("no entry for {}", symbol)))?;
    let price = entry
        .get("usd")
        .and_then(Value::as_f64)
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "missing usd price"))?;

    let mut quote = SpotQuote::new(symbol, price, PROVIDER_ID);
    quote.change_24h_pct = entry.get("usd_24h_change").and_then(Value::as_f64);
    quote.volume_24h = entry.get("usd_24h_vol").and_then(Value::as_f64);
    quote.market_cap = entry.get("usd_market_cap").and_then(Value::as_f64);
    Ok(quote)
}

fn parse_market_chart(symbol: &str, value: &Value) -> Result<NormalizedSeries, MarketDataError> {
    let prices = value
        .get("prices")
        .and_then(Value::as_array)
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "missing prices array"))?;
    let volumes = value.get("total_volumes").and_then(Value::as_array);

    let mut points = Vec::with_capacity(prices.len());
    for (i, pair) in prices.iter().enumerate() {
        let (Some(ms), Some(price)) = (
            pair.get(0).and_then(Value::as_i64),
            pair.get(1).and_then(Value::as_f64),
        ) else {
            continue;
        };
        let Some(timestamp) = Utc.timestamp_millis_opt(ms).single() else {
            continue;
        };
        let volume = volumes
            .and_then(|v| v.get(i))
            .and_then(|pair| pair.get(1))
            .and_then(Value::as_f64);
        points.push(SeriesPoint {
            timestamp,
            price,
            volume,
        });
    }

    Ok(NormalizedSeries::new(symbol, PROVIDER_ID, points))
}

fn parse_global(value: &Value) -> Result<GlobalMetrics, MarketDataError> {
    let data = value
        .get("data")
        .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "missing data object"))?;
    let usd = |field: &str| {
        data.get(field)
            .and_then(|v| v.get("usd"))
            .and_then(Value::as_f64)
    };

    Ok(GlobalMetrics {
        total_market_cap_usd: usd("total_market_cap")
            .ok_or_else(|| MarketDataError::parse(PROVIDER_ID, "missing total_market_cap"))?,
        total_volume_usd: usd("total_volume").unwrap_or_default(),
        btc_dominance_pct: data
            .get("market_cap_percentage")
            .and_then(|v| v.get("btc"))
            .and_then(Value::as_f64),
        active_cryptocurrencies: data.get("active_cryptocurrencies").and_then(Value::as_u64),
        source_provider: PROVIDER_ID.to_string(),
        timestamp: Utc::now(),
    })
}
