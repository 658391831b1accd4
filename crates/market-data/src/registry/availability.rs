//! Per-provider availability tracking.
//!
//! Each provider is in one of three states:
//!
//! - **Available**: calls are allowed.
//! - **RateLimited**: the provider throttled us; calls resume on their own
//!   once the retry-after deadline passes (checked lazily on read).
//! - **Disabled**: credentials or credits are exhausted. Terminal until an
//!   operator calls [`AvailabilityTracker::reset`].
//!
//! State is in-memory and resets when the process restarts.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

/// Upper bound on a single rate-limit suppression.
pub const MAX_RATE_LIMIT: Duration = Duration::from_secs(7 * 24 * 3600);

/// Externally visible provider state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    Available,
    RateLimited,
    Disabled,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "AVAILABLE"),
            Self::RateLimited => write!(f, "RATE_LIMITED"),
            Self::Disabled => write!(f, "DISABLED"),
        }
    }
}

/// Snapshot of one provider's availability, as reported by
/// [`AvailabilityTracker::get_status`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AvailabilityState {
    pub state: ProviderState,
    pub rate_limited_until: Option<DateTime<Utc>>,
    pub disabled: bool,
    pub disabled_reason: Option<String>,
    pub disabled_since: Option<DateTime<Utc>>,
}

/// Aggregate counts across all registered providers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AvailabilityCounts {
    pub available: usize,
    pub rate_limited: usize,
    pub disabled: usize,
    pub total: usize,
}

impl AvailabilityCounts {
    pub fn unavailable(&self) -> usize {
        self.rate_limited + self.disabled
    }
}

#[derive(Debug)]
struct RateLimitDeadline {
    /// Monotonic deadline used for the availability check.
    until: Instant,
    /// Wall-clock equivalent for status reporting.
    until_utc: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Availability {
    rate_limited: Option<RateLimitDeadline>,
    disabled_reason: Option<String>,
    disabled_since: Option<DateTime<Utc>>,
}

impl Availability {
    /// Drop an expired rate limit. Returns the resulting state.
    fn refresh(&mut self, now: Instant) -> ProviderState {
        if self.disabled_since.is_some() {
            return ProviderState::Disabled;
        }
        match &self.rate_limited {
            Some(deadline) if now < deadline.until => ProviderState::RateLimited,
            Some(_) => {
                self.rate_limited = None;
                ProviderState::Available
            }
            None => ProviderState::Available,
        }
    }

    fn snapshot(&self, state: ProviderState) -> AvailabilityState {
        AvailabilityState {
            state,
            rate_limited_until: self.rate_limited.as_ref().map(|d| d.until_utc),
            disabled: self.disabled_since.is_some(),
            disabled_reason: self.disabled_reason.clone(),
            disabled_since: self.disabled_since,
        }
    }
}

/// Thread-safe availability tracker shared by the orchestrator and the
/// preloader.
///
/// Unknown providers read as available without being recorded; only
/// [`register`](Self::register) and the `mark_*` writes add entries.
#[derive(Default)]
pub struct AvailabilityTracker {
    providers: Mutex<HashMap<String, Availability>>,
}

impl AvailabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the provider map, recovering from poison if necessary.
    ///
    /// A poisoned lock only means a panic happened mid-update; the map itself
    /// is still a valid set of per-provider states.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Availability>> {
        self.providers.lock().unwrap_or_else(|poisoned| {
            warn!("Availability tracker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register a provider in the AVAILABLE state. Existing state is kept.
    pub fn register(&self, provider: &str) {
        self.lock().entry(provider.to_string()).or_default();
    }

    /// Suppress a provider for `reset_after`.
    ///
    /// A later deadline never gets shortened by a smaller retry-after.
    /// Suppressions longer than [`MAX_RATE_LIMIT`] are capped.
    pub fn mark_rate_limited(&self, provider: &str, reset_after: Duration) {
        let reset_after = reset_after.min(MAX_RATE_LIMIT);
        let now = Instant::now();
        let mut providers = self.lock();
        let entry = providers.entry(provider.to_string()).or_default();

        if entry.disabled_since.is_some() {
            debug!(
                "Provider '{}' is disabled, ignoring rate limit of {:?}",
                provider, reset_after
            );
            return;
        }

        let until = now.checked_add(reset_after).unwrap_or(now);
        if matches!(&entry.rate_limited, Some(existing) if existing.until >= until) {
            return;
        }

        let until_utc = Utc::now()
            + chrono::Duration::from_std(reset_after).unwrap_or_else(|_| chrono::Duration::zero());
        info!(
            "Provider '{}' rate limited for {}s (until {})",
            provider,
            reset_after.as_secs(),
            until_utc.to_rfc3339()
        );
        entry.rate_limited = Some(RateLimitDeadline { until, until_utc });
    }

    /// Permanently remove a provider from rotation.
    pub fn mark_disabled(&self, provider: &str, reason: &str) {
        let mut providers = self.lock();
        let entry = providers.entry(provider.to_string()).or_default();

        if entry.disabled_since.is_some() {
            return;
        }

        warn!("Provider '{}' disabled: {}", provider, reason);
        entry.rate_limited = None;
        entry.disabled_reason = Some(reason.to_string());
        entry.disabled_since = Some(Utc::now());
    }

    pub fn is_available(&self, provider: &str) -> bool {
        self.state(provider) == ProviderState::Available
    }

    /// Current state of a provider, clearing an elapsed rate limit.
    pub fn state(&self, provider: &str) -> ProviderState {
        let now = Instant::now();
        let mut providers = self.lock();
        providers
            .get_mut(provider)
            .map_or(ProviderState::Available, |entry| entry.refresh(now))
    }

    /// Detailed state of every registered provider.
    pub fn get_status(&self) -> BTreeMap<String, AvailabilityState> {
        let now = Instant::now();
        let mut providers = self.lock();
        providers
            .iter_mut()
            .map(|(id, availability)| {
                let state = availability.refresh(now);
                (id.clone(), availability.snapshot(state))
            })
            .collect()
    }

    /// Operator reset: the only way out of DISABLED.
    ///
    /// Returns `false` when the provider was never registered.
    pub fn reset(&self, provider: &str) -> bool {
        let mut providers = self.lock();
        match providers.get_mut(provider) {
            Some(entry) => {
                info!("Provider '{}' reset to AVAILABLE", provider);
                *entry = Availability::default();
                true
            }
            None => false,
        }
    }

    pub fn counts(&self) -> AvailabilityCounts {
        let now = Instant::now();
        let mut providers = self.lock();
        let mut counts = AvailabilityCounts {
            total: providers.len(),
            ..Default::default()
        };
        for availability in providers.values_mut() {
            match availability.refresh(now) {
                ProviderState::Available => counts.available += 1,
                ProviderState::RateLimited => counts.rate_limited += 1,
                ProviderState::Disabled => counts.disabled += 1,
            }
        }
        counts
    }

    /// Fraction of registered providers that are rate limited or disabled.
    pub fn unavailable_ratio(&self) -> f64 {
        let counts = self.counts();
        if counts.total == 0 {
            return 0.0;
        }
        counts.unavailable() as f64 / counts.total as f64
    }
}
