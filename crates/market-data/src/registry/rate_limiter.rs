//! Minimum-interval pacer for provider calls.
//!
//! Each provider gets a slot schedule: a call may start no earlier than
//! `min_interval` after the previous call's slot. Slots are reserved under
//! the lock and waited on outside of it, so concurrent callers queue up
//! in order without holding the mutex across a sleep.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::provider::RateLimit;

#[derive(Debug)]
struct Schedule {
    min_interval: Duration,
    next_slot: Option<Instant>,
}

impl Schedule {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: None,
        }
    }

    /// Reserve the next slot and return how long to wait for it.
    fn reserve(&mut self, now: Instant) -> Duration {
        let slot = match self.next_slot {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next_slot = Some(slot + self.min_interval);
        slot.saturating_duration_since(now)
    }
}

/// Per-provider call pacer.
///
/// Providers without an explicit configuration are not paced.
#[derive(Default)]
pub struct RateLimiter {
    schedules: Mutex<HashMap<String, Schedule>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_schedules(&self) -> MutexGuard<'_, HashMap<String, Schedule>> {
        self.schedules.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Configure pacing for a provider, resetting any pending schedule.
    pub fn configure(&self, provider: &str, limit: RateLimit) {
        self.lock_schedules()
            .insert(provider.to_string(), Schedule::new(limit.min_interval));
    }

    pub fn min_interval(&self, provider: &str) -> Option<Duration> {
        self.lock_schedules()
            .get(provider)
            .map(|schedule| schedule.min_interval)
    }

    /// Wait until the provider's next call slot.
    pub async fn acquire(&self, provider: &str) {
        let wait = {
            let mut schedules = self.lock_schedules();
            match schedules.get_mut(provider) {
                Some(schedule) => schedule.reserve(Instant::now()),
                None => Duration::ZERO,
            }
        };

        if !wait.is_zero() {
            debug!("Rate limiter: waiting {:?} for provider '{}'", wait, provider);
            tokio::time::sleep(wait).await;
        }
    }

    /// Forget the pending schedule for a provider, keeping its interval.
    pub fn reset(&self, provider: &str) {
        if let Some(schedule) = self.lock_schedules().get_mut(provider) {
            schedule.next_slot = None;
        }
    }
}
