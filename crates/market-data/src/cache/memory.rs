//! In-process fallback tier.
//!
//! Local to this process: in multi-instance deployments every instance has
//! its own copy, and nothing here is shared. Entries are only removed by
//! explicit deletes or by [`MemoryTier::cleanup_expired`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;

use super::pattern::GlobPattern;
use super::CacheEntry;

#[derive(Default)]
pub struct MemoryTier {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Memory cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, entry: CacheEntry) {
        self.lock().insert(entry.key.clone(), entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn remove_matching(&self, pattern: &GlobPattern) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !pattern.matches(key));
        before - entries.len()
    }

    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Drop entries stored more than `max_age` before `now`.
    pub fn cleanup_expired(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| now.signed_duration_since(entry.stored_at) <= max_age);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}
