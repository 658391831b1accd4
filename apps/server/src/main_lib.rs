use std::sync::Arc;

use chrono::{DateTime, Utc};
use coinlens_market_data::MarketDataService;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub market_data_service: Arc<MarketDataService>,
    pub started_at: DateTime<Utc>,
}

/// Install the global subscriber. `log` records from the library are
/// bridged by `tracing-subscriber`'s default `tracing-log` feature.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let service = MarketDataService::from_config(&config.market_data).await;
    tracing::info!(
        "Market data service ready: {} providers, durable cache {}",
        service.orchestrator().providers().len(),
        if service.orchestrator().cache().has_durable() {
            "connected"
        } else {
            "disabled"
        }
    );

    Ok(Arc::new(AppState {
        market_data_service: Arc::new(service),
        started_at: Utc::now(),
    }))
}
