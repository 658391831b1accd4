//! Environment-driven configuration.
//!
//! Every setting has a default, so an empty environment yields a working
//! memory-only setup with the keyless providers.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

use crate::cache::CacheTtls;
use crate::preloader::{PreloadConfig, PreloadSchedule};
use crate::provider::alternative_me::AlternativeMeProvider;
use crate::provider::binance::BinanceProvider;
use crate::provider::coingecko::CoinGeckoProvider;
use crate::provider::cryptocompare::CryptoCompareProvider;
use crate::provider::fred::FredProvider;
use crate::provider::{MarketDataProvider, RateLimit};
use crate::registry::FallbackConfig;

/// Provider ids known to [`MarketDataConfig::build_providers`].
pub const KNOWN_PROVIDERS: &[&str] = &[
    "COINGECKO",
    "CRYPTOCOMPARE",
    "BINANCE",
    "ALTERNATIVE_ME",
    "FRED",
];

const DAY_SECS: u64 = 24 * 3600;

/// Accepted cache TTLs: one second to ten years.
const TTL_RANGE: RangeInclusive<u64> = 1..=10 * 365 * DAY_SECS;

pub const DEFAULT_PRELOAD_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "SOL", "BNB", "XRP", "ADA", "DOGE", "AVAX", "DOT", "LINK",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Durable cache connection settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedisConfig {
    /// Full connection URI. Takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    pub tls: bool,
}

impl RedisConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.host.is_some()
    }

    /// Connection URI, or `None` when no durable tier is configured.
    pub fn connection_url(&self) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        let host = self.host.as_ref()?;
        let scheme = if self.tls { "rediss" } else { "redis" };
        let auth = match &self.password {
            Some(password) => format!(":{}@", urlencoding::encode(password)),
            None => String::new(),
        };
        Some(format!(
            "{}://{}{}:{}/{}",
            scheme, auth, host, self.port, self.db
        ))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    /// Overrides the adapter's own minimum call interval.
    pub min_interval: Option<Duration>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PreloadSettings {
    pub enabled: bool,
    pub symbols: Vec<String>,
    pub schedule: PreloadSchedule,
    pub config: PreloadConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarketDataConfig {
    pub redis: RedisConfig,
    pub ttls: CacheTtls,
    pub fallback: FallbackConfig,
    pub providers: BTreeMap<String, ProviderSettings>,
    pub preload: PreloadSettings,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            symbols: DEFAULT_PRELOAD_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            schedule: PreloadSchedule::default(),
            config: PreloadConfig::default(),
        }
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig {
                port: 6379,
                ..RedisConfig::default()
            },
            ttls: CacheTtls::default(),
            fallback: FallbackConfig::default(),
            providers: KNOWN_PROVIDERS
                .iter()
                .map(|id| {
                    let settings = ProviderSettings {
                        enabled: true,
                        ..ProviderSettings::default()
                    };
                    (id.to_string(), settings)
                })
                .collect(),
            preload: PreloadSettings::default(),
        }
    }
}

/// Typed access to a key/value source.
struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, name: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.string(name) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn flag(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        match self.string(name).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(v) => Err(ConfigError::Invalid {
                name: name.to_string(),
                value: v,
                reason: "expected a boolean".to_string(),
            }),
        }
    }

    /// Like [`parse`](Self::parse), rejecting values outside `range`.
    fn ranged<T>(&self, name: &str, default: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Display,
        T::Err: Display,
    {
        let value = self.parse(name, default)?;
        if range.contains(&value) {
            return Ok(value);
        }
        Err(ConfigError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            reason: format!("must be between {} and {}", range.start(), range.end()),
        })
    }

    fn secs(
        &self,
        name: &str,
        default: Duration,
        range: RangeInclusive<u64>,
    ) -> Result<Duration, ConfigError> {
        self.ranged(name, default.as_secs(), range)
            .map(Duration::from_secs)
    }
}

impl MarketDataConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration from an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let redis = RedisConfig {
            url: env.string("REDIS_URL"),
            host: env.string("REDIS_HOST"),
            port: env.parse("REDIS_PORT", 6379)?,
            password: env.string("REDIS_PASSWORD"),
            db: env.parse("REDIS_DB", 0)?,
            tls: env.flag("REDIS_TLS", false)?,
        };

        let defaults = CacheTtls::default();
        let ttls = CacheTtls {
            market_snapshot: env.ranged(
                "CACHE_TTL_MARKET_SNAPSHOT",
                defaults.market_snapshot,
                TTL_RANGE,
            )?,
            historical: env.ranged("CACHE_TTL_HISTORICAL", defaults.historical, TTL_RANGE)?,
            batch: env.ranged("CACHE_TTL_BATCH", defaults.batch, TTL_RANGE)?,
            risk_free_rate: env.ranged(
                "CACHE_TTL_RISK_FREE_RATE",
                defaults.risk_free_rate,
                TTL_RANGE,
            )?,
            fear_greed: env.ranged("CACHE_TTL_FEAR_GREED", defaults.fear_greed, TTL_RANGE)?,
            global: env.ranged("CACHE_TTL_GLOBAL", defaults.global, TTL_RANGE)?,
        };

        let defaults = FallbackConfig::default();
        let fallback = FallbackConfig {
            max_attempts: env.ranged("FETCH_MAX_RETRIES", defaults.max_attempts, 1..=100)?,
            unavailable_backoff: env.secs(
                "FETCH_UNAVAILABLE_BACKOFF_SECS",
                defaults.unavailable_backoff,
                0..=DAY_SECS,
            )?,
            failure_delay: env.secs("FETCH_RETRY_DELAY_SECS", defaults.failure_delay, 0..=DAY_SECS)?,
            min_series_points: env.parse("FETCH_MIN_DATA_POINTS", defaults.min_series_points)?,
            provider_timeout: env.secs(
                "PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout,
                1..=3600,
            )?,
            fetch_budget: env.secs("FETCH_BUDGET_SECS", defaults.fetch_budget, 1..=7 * DAY_SECS)?,
        };

        let mut providers = BTreeMap::new();
        for id in KNOWN_PROVIDERS {
            let name = format!("{}_RATE_LIMIT_MS", id);
            let min_interval = match env.string(&name) {
                Some(_) => Some(Duration::from_millis(env.ranged(&name, 0, 0..=3_600_000)?)),
                None => None,
            };
            providers.insert(
                id.to_string(),
                ProviderSettings {
                    enabled: env.flag(&format!("{}_ENABLED", id), true)?,
                    api_key: env.string(&format!("{}_API_KEY", id)),
                    min_interval,
                },
            );
        }

        let symbols = match env.string("PRELOAD_SYMBOLS") {
            Some(list) => list
                .split(',')
                .map(crate::models::normalize_symbol)
                .filter(|s| !s.is_empty())
                .collect(),
            None => PreloadSettings::default().symbols,
        };
        let schedule_defaults = PreloadSchedule::default();
        let preload = PreloadSettings {
            enabled: env.flag("PRELOAD_ENABLED", true)?,
            symbols,
            schedule: PreloadSchedule {
                initial_delay: env.secs(
                    "PRELOAD_INITIAL_DELAY_SECS",
                    schedule_defaults.initial_delay,
                    0..=DAY_SECS,
                )?,
                interval: env.secs(
                    "PRELOAD_INTERVAL_SECS",
                    schedule_defaults.interval,
                    60..=30 * DAY_SECS,
                )?,
            },
            config: PreloadConfig::default(),
        };

        Ok(Self {
            redis,
            ttls,
            fallback,
            providers,
            preload,
        })
    }

    fn provider(&self, id: &str) -> Option<&ProviderSettings> {
        self.providers.get(id).filter(|settings| settings.enabled)
    }

    /// Instantiate every enabled provider.
    ///
    /// Providers that need an API key are skipped when none is configured.
    pub fn build_providers(&self) -> Vec<Arc<dyn MarketDataProvider>> {
        let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();

        if let Some(settings) = self.provider("COINGECKO") {
            providers.push(Arc::new(CoinGeckoProvider::new(settings.api_key.clone())));
        }
        if let Some(settings) = self.provider("CRYPTOCOMPARE") {
            providers.push(Arc::new(CryptoCompareProvider::new(settings.api_key.clone())));
        }
        if self.provider("BINANCE").is_some() {
            providers.push(Arc::new(BinanceProvider::new()));
        }
        if self.provider("ALTERNATIVE_ME").is_some() {
            providers.push(Arc::new(AlternativeMeProvider::new()));
        }
        if let Some(settings) = self.provider("FRED") {
            match &settings.api_key {
                Some(key) => providers.push(Arc::new(FredProvider::new(key.clone()))),
                None => debug!("Provider FRED requires API key but none found, skipping"),
            }
        }

        info!(
            "Initialized market data providers: {}",
            providers.iter().map(|p| p.id()).collect::<Vec<_>>().join(", ")
        );
        providers
    }

    /// Configured pacing overrides, by provider id.
    pub fn rate_limit_overrides(&self) -> Vec<(String, RateLimit)> {
        self.providers
            .iter()
            .filter_map(|(id, settings)| {
                settings
                    .min_interval
                    .map(|min_interval| (id.clone(), RateLimit { min_interval }))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<MarketDataConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MarketDataConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(!config.redis.is_configured());
        assert_eq!(config.redis.connection_url(), None);
        assert_eq!(config.ttls, CacheTtls::default());
        assert_eq!(config.fallback, FallbackConfig::default());
        assert_eq!(config.preload.symbols.len(), 10);
        assert_eq!(config.preload.symbols[0], "BTC");
        assert!(config.preload.enabled);
        assert_eq!(config, MarketDataConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CACHE_TTL_HISTORICAL", "7200"),
            ("FETCH_MAX_RETRIES", "2"),
            ("FETCH_RETRY_DELAY_SECS", "1"),
            ("FETCH_MIN_DATA_POINTS", "20"),
            ("PROVIDER_TIMEOUT_SECS", "10"),
            ("COINGECKO_RATE_LIMIT_MS", "2500"),
            ("COINGECKO_API_KEY", "demo"),
            ("PRELOAD_SYMBOLS", " btc, eth ,,sol "),
            ("PRELOAD_INTERVAL_SECS", "3600"),
            ("PRELOAD_ENABLED", "false"),
        ])
        .unwrap();

        assert_eq!(config.ttls.historical, 7200);
        assert_eq!(config.fallback.max_attempts, 2);
        assert_eq!(config.fallback.failure_delay, Duration::from_secs(1));
        assert_eq!(config.fallback.min_series_points, 20);
        assert_eq!(config.fallback.provider_timeout, Duration::from_secs(10));
        assert_eq!(config.providers["COINGECKO"].api_key.as_deref(), Some("demo"));
        assert_eq!(
            config.rate_limit_overrides(),
            vec![(
                "COINGECKO".to_string(),
                RateLimit {
                    min_interval: Duration::from_millis(2500)
                }
            )]
        );
        assert_eq!(config.preload.symbols, vec!["BTC", "ETH", "SOL"]);
        assert_eq!(config.preload.schedule.interval, Duration::from_secs(3600));
        assert!(!config.preload.enabled);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = config_from(&[("REDIS_PORT", "sixty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref name, .. } if name == "REDIS_PORT"));

        let err = config_from(&[("PRELOAD_ENABLED", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let rejected = [
            ("PRELOAD_INTERVAL_SECS", "0"),
            ("CACHE_TTL_GLOBAL", "0"),
            ("CACHE_TTL_HISTORICAL", "18446744073709551615"),
            ("CACHE_TTL_BATCH", "100000000000000000"),
            ("FETCH_MAX_RETRIES", "0"),
            ("FETCH_MAX_RETRIES", "4294967295"),
            ("FETCH_UNAVAILABLE_BACKOFF_SECS", "18446744073709551615"),
            ("PROVIDER_TIMEOUT_SECS", "0"),
            ("FETCH_BUDGET_SECS", "0"),
            ("BINANCE_RATE_LIMIT_MS", "18446744073709551615"),
        ];
        for (key, value) in rejected {
            let err = config_from(&[(key, value)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { ref name, .. } if name == key),
                "{key}={value} accepted"
            );
        }

        let config = config_from(&[
            ("PRELOAD_INTERVAL_SECS", "60"),
            ("FETCH_UNAVAILABLE_BACKOFF_SECS", "0"),
            ("CACHE_TTL_HISTORICAL", "1"),
        ])
        .unwrap();
        assert_eq!(config.preload.schedule.interval, Duration::from_secs(60));
        assert_eq!(config.ttls.historical, 1);
    }

    #[test]
    fn test_redis_url_from_parts() {
        let config = config_from(&[
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_PASSWORD", "p@ss word"),
            ("REDIS_DB", "2"),
            ("REDIS_TLS", "true"),
        ])
        .unwrap();
        assert_eq!(
            config.redis.connection_url().as_deref(),
            Some("rediss://:p%40ss%20word@cache.internal:6380/2")
        );

        let config = config_from(&[("REDIS_URL", "redis://localhost:6379/0"), ("REDIS_HOST", "x")])
            .unwrap();
        assert_eq!(
            config.redis.connection_url().as_deref(),
            Some("redis://localhost:6379/0")
        );
    }

    #[test]
    fn test_build_providers() {
        let ids = |config: &MarketDataConfig| {
            config
                .build_providers()
                .iter()
                .map(|p| p.id())
                .collect::<Vec<_>>()
        };

        let config = config_from(&[]).unwrap();
        assert_eq!(ids(&config), vec!["COINGECKO", "CRYPTOCOMPARE", "BINANCE", "ALTERNATIVE_ME"]);

        let config = config_from(&[("FRED_API_KEY", "k"), ("BINANCE_ENABLED", "0")]).unwrap();
        assert_eq!(
            ids(&config),
            vec!["COINGECKO", "CRYPTOCOMPARE", "ALTERNATIVE_ME", "FRED"]
        );
    }
}
