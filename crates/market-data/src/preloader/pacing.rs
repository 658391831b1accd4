//! Adaptive pacing for batch preloads.
//!
//! Delays grow with the number of consecutive rate-limit events and are
//! capped. All functions here are pure so they can be tested without a clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::registry::AvailabilityCounts;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    pub base_delay: Duration,
    /// Cap for the delay between the calls of one symbol.
    pub max_call_delay: Duration,
    /// Cap for the delay between two symbols.
    pub max_batch_delay: Duration,
    /// Above this unavailable ratio, the inter-call delay is doubled again.
    pub doubling_ratio: f64,
    /// Above this unavailable ratio, the batch pauses.
    pub pause_ratio: f64,
    pub pause_duration: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_call_delay: Duration::from_secs(5),
            max_batch_delay: Duration::from_secs(10),
            doubling_ratio: 0.3,
            pause_ratio: 0.6,
            pause_duration: Duration::from_secs(60),
        }
    }
}

/// Consecutive rate-limit counter for one preload run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacingState {
    pub consecutive_failures: u32,
}

impl PacingState {
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_rate_limit(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}

/// `min(base * 2^min(failures, 3), cap)`, doubled when more than
/// `doubling_ratio` of providers are unavailable.
pub fn inter_call_delay(
    config: &PacingConfig,
    consecutive_failures: u32,
    unavailable_ratio: f64,
) -> Duration {
    let factor = 2f64.powi(consecutive_failures.min(3) as i32);
    let delay = config.base_delay.mul_f64(factor).min(config.max_call_delay);
    if unavailable_ratio > config.doubling_ratio {
        delay * 2
    } else {
        delay
    }
}

/// `min(base * 1.5^min(failures, 5) * (1 + index / total * 0.5), cap)`.
///
/// Later symbols in a batch wait slightly longer.
pub fn batch_delay(
    config: &PacingConfig,
    index: usize,
    total: usize,
    consecutive_failures: u32,
) -> Duration {
    let backoff = 1.5f64.powi(consecutive_failures.min(5) as i32);
    let progress = if total == 0 {
        0.0
    } else {
        index as f64 / total as f64
    };
    config
        .base_delay
        .mul_f64(backoff * (1.0 + progress * 0.5))
        .min(config.max_batch_delay)
}

/// Emergency brake: more than `pause_ratio` of providers are unavailable.
pub fn should_pause(config: &PacingConfig, counts: &AvailabilityCounts) -> bool {
    if counts.total == 0 {
        return false;
    }
    counts.unavailable() as f64 / counts.total as f64 > config.pause_ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inter_call_delay_growth_and_cap() {
        let config = PacingConfig::default();
        assert_eq!(inter_call_delay(&config, 0, 0.0), Duration::from_millis(500));
        assert_eq!(inter_call_delay(&config, 1, 0.0), Duration::from_secs(1));
        assert_eq!(inter_call_delay(&config, 3, 0.0), Duration::from_secs(4));
        // Exponent is capped at 3.
        assert_eq!(inter_call_delay(&config, 10, 0.0), Duration::from_secs(4));
    }

    #[test]
    fn test_inter_call_delay_doubles_when_providers_unavailable() {
        let config = PacingConfig::default();
        assert_eq!(inter_call_delay(&config, 0, 0.3), Duration::from_millis(500));
        assert_eq!(inter_call_delay(&config, 0, 0.34), Duration::from_secs(1));
        assert_eq!(inter_call_delay(&config, 3, 0.5), Duration::from_secs(8));
    }

    #[test]
    fn test_batch_delay_progress_factor() {
        let config = PacingConfig::default();
        assert_eq!(batch_delay(&config, 0, 10, 0), Duration::from_millis(500));
        assert_eq!(batch_delay(&config, 5, 10, 0), Duration::from_millis(625));
        assert_eq!(batch_delay(&config, 0, 0, 0), Duration::from_millis(500));
    }

    #[test]
    fn test_batch_delay_monotonic_in_failures_up_to_cap() {
        let config = PacingConfig::default();
        for index in [0, 3, 9] {
            let mut previous = Duration::ZERO;
            for failures in 0..12 {
                let delay = batch_delay(&config, index, 10, failures);
                assert!(delay >= previous, "failures={} index={}", failures, index);
                assert!(delay <= config.max_batch_delay);
                previous = delay;
            }
        }
    }

    #[test]
    fn test_should_pause_threshold() {
        let config = PacingConfig::default();
        let counts = |unavailable: usize, total: usize| AvailabilityCounts {
            available: total - unavailable,
            rate_limited: unavailable,
            disabled: 0,
            total,
        };
        assert!(!should_pause(&config, &counts(3, 5)));
        assert!(should_pause(&config, &counts(4, 5)));
        assert!(!should_pause(&config, &AvailabilityCounts::default()));
    }

    #[test]
    fn test_pacing_state() {
        let mut state = PacingState::default();
        state.record_rate_limit();
        state.record_rate_limit();
        assert_eq!(state.consecutive_failures, 2);
        state.record_success();
        assert_eq!(state.consecutive_failures, 0);
    }
}
