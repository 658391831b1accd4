use std::net::SocketAddr;

use anyhow::Context;
use coinlens_market_data::MarketDataConfig;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_format: String,
    pub cors_allow: Vec<String>,
    pub market_data: MarketDataConfig,
}

impl Config {
    /// Load `.env`, then read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr: SocketAddr = lookup("CL_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .context("Invalid CL_LISTEN_ADDR")?;
        let log_format = lookup("CL_LOG_FORMAT").unwrap_or_else(|| "text".to_string());
        let cors_allow = lookup("CL_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let market_data = MarketDataConfig::from_lookup(&lookup)?;

        Ok(Self {
            listen_addr,
            log_format,
            cors_allow,
            market_data,
        })
    }
}
