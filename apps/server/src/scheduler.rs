//! Background scheduler for periodic market data preloads.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::main_lib::AppState;

/// Starts the preload scheduler unless disabled by configuration.
pub fn start_preload_scheduler(state: &Arc<AppState>, config: &Config) {
    let preload = &config.market_data.preload;
    if !preload.enabled {
        info!("Preload scheduler disabled (PRELOAD_ENABLED=false)");
        return;
    }
    if preload.symbols.is_empty() {
        info!("Preload scheduler not started: no symbols configured");
        return;
    }
    // Detached; lives as long as the runtime.
    let _ = state
        .market_data_service
        .start_scheduler(preload.schedule.clone());
}
