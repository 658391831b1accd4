//! Background scheduler for periodic preloads.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::interval;

use super::{BatchPreloader, PreloadError};

/// Shortest period between scheduled preloads.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreloadSchedule {
    /// Delay before the first run, to let the process finish starting.
    pub initial_delay: Duration,
    pub interval: Duration,
}

impl Default for PreloadSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            interval: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Start the preload loop on the tokio runtime.
///
/// The first tick fires right after `initial_delay`; later ticks are
/// `interval` apart, with a floor of [`MIN_INTERVAL`]. Each cycle also sweeps
/// the memory cache tier of entries older than the batch TTL.
pub fn spawn_scheduler(
    preloader: Arc<BatchPreloader>,
    symbols: Vec<String>,
    schedule: PreloadSchedule,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Preload scheduler started ({} symbols every {:?})",
            symbols.len(),
            schedule.interval
        );

        tokio::time::sleep(schedule.initial_delay).await;

        let mut ticker = interval(schedule.interval.max(MIN_INTERVAL));
        loop {
            ticker.tick().await;
            run_scheduled_preload(&preloader, &symbols).await;
        }
    })
}

async fn run_scheduled_preload(preloader: &BatchPreloader, symbols: &[String]) {
    info!("Running scheduled preload...");

    match preloader.preload_all(symbols).await {
        Ok(report) => {
            info!(
                "Scheduled preload completed: {}/{} symbols loaded",
                report.symbols_loaded, report.symbols_total
            );
        }
        Err(PreloadError::AlreadyRunning) => {
            debug!("Scheduled preload skipped: a run is already in progress");
        }
    }

    let orchestrator = preloader.orchestrator();
    let max_age = Duration::from_secs(orchestrator.ttls().batch);
    let swept = orchestrator.cache().cleanup_expired(max_age);
    if swept > 0 {
        info!("Swept {} stale entries from the memory cache tier", swept);
    }
}
