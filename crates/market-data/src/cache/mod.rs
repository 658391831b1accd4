//! Two-tier cache.
//!
//! - The durable tier ([`DurableStore`], Redis in production) is shared across
//!   processes and survives restarts. It is the source of truth when reachable.
//! - The memory tier ([`MemoryTier`]) keeps the system serving when the
//!   durable tier is down. Writes land there only when the durable write fails.
//!
//! Backend failures never reach callers: every operation degrades to the
//! memory tier and logs.

mod codec;
mod durable;
mod memory;
mod pattern;
#[cfg(feature = "redis")]
mod redis_store;
mod ttl;

pub use codec::to_cache_value;
pub use durable::DurableStore;
pub use memory::MemoryTier;
pub use pattern::GlobPattern;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use ttl::{CacheTtls, SAFETY_BUFFER_SECS};

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failures inside the cache. Absorbed by [`CacheStore`], never returned
/// to its callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache codec error: {0}")]
    Codec(String),
}

/// One cached value with its write metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl CacheEntry {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.stored_at)
    }

    /// Whether the entry is still within its own TTL at `now`.
    ///
    /// A TTL beyond what `chrono` can represent never expires.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .map_or(true, |ttl| self.age(now) < ttl)
    }
}

/// Connectivity report for both tiers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheHealth {
    pub durable_configured: bool,
    pub durable_backend: Option<String>,
    pub durable_connected: bool,
    pub durable_latency_ms: Option<f64>,
    pub durable_error: Option<String>,
    pub memory_entries: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub durable_errors: u64,
    pub memory_fallback_writes: u64,
    pub memory_entries: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    durable_errors: AtomicU64,
    memory_fallback_writes: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Two-tier TTL cache.
pub struct CacheStore {
    durable: Option<Arc<dyn DurableStore>>,
    memory: MemoryTier,
    counters: Counters,
}

impl CacheStore {
    /// Cache with both tiers.
    pub fn new(durable: Arc<dyn DurableStore>) -> Self {
        Self::with_durable(Some(durable))
    }

    /// Cache without a durable tier (local development, tests).
    pub fn memory_only() -> Self {
        Self::with_durable(None)
    }

    pub fn with_durable(durable: Option<Arc<dyn DurableStore>>) -> Self {
        Self {
            durable,
            memory: MemoryTier::new(),
            counters: Counters::default(),
        }
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Read an entry, durable tier first.
    ///
    /// A durable miss, backend failure or undecodable record falls through to
    /// the memory tier. Unknown keys return `None`.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        if let Some(durable) = &self.durable {
            match durable.get(key).await {
                Ok(Some(payload)) => match codec::decode(key, &payload) {
                    Ok(entry) => {
                        Counters::bump(&self.counters.hits);
                        return Some(entry);
                    }
                    Err(e) => {
                        warn!("Discarding undecodable cache record '{}': {}", key, e);
                        Counters::bump(&self.counters.durable_errors);
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    warn!("Durable cache read failed for '{}': {}", key, e);
                    Counters::bump(&self.counters.durable_errors);
                }
            }
        }

        let entry = self.memory.get(key);
        if entry.is_some() {
            Counters::bump(&self.counters.hits);
        } else {
            Counters::bump(&self.counters.misses);
        }
        entry
    }

    /// Write an entry.
    ///
    /// The durable record expires natively `ttl_seconds + 60s` after writing.
    /// When the durable write fails the entry goes to the memory tier only.
    pub async fn set(&self, key: &str, value: Value, stored_at: DateTime<Utc>, ttl_seconds: u64) {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at,
            ttl_seconds,
        };

        if let Some(durable) = &self.durable {
            let expiry = Duration::from_secs(ttl_seconds.saturating_add(SAFETY_BUFFER_SECS));
            let written = match codec::encode(&entry) {
                Ok(payload) => durable.set_with_expiry(key, payload, expiry).await,
                Err(e) => Err(e),
            };
            match written {
                Ok(()) => {
                    // Drop any copy written during an outage.
                    self.memory.remove(key);
                    debug!("Cached '{}' (ttl {}s)", key, ttl_seconds);
                    return;
                }
                Err(e) => {
                    warn!(
                        "Durable cache write failed for '{}', using memory tier: {}",
                        key, e
                    );
                    Counters::bump(&self.counters.durable_errors);
                }
            }
        }

        Counters::bump(&self.counters.memory_fallback_writes);
        self.memory.insert(entry);
    }

    /// Typed read. Entries that do not deserialize as `T` are treated as misses.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<(T, DateTime<Utc>)> {
        let entry = self.get(key).await?;
        match serde_json::from_value(entry.value) {
            Ok(value) => Some((value, entry.stored_at)),
            Err(e) => {
                warn!("Cached value for '{}' has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Read that also enforces the entry's own TTL.
    pub async fn get_fresh(&self, key: &str) -> Option<CacheEntry> {
        let entry = self.get(key).await?;
        if !entry.is_fresh(Utc::now()) {
            debug!("Cache entry '{}' is stale", key);
            return None;
        }
        Some(entry)
    }

    /// Typed read that also enforces the entry's own TTL.
    pub async fn get_fresh_as<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<(T, DateTime<Utc>)> {
        let entry = self.get_fresh(key).await?;
        match serde_json::from_value(entry.value) {
            Ok(value) => Some((value, entry.stored_at)),
            Err(e) => {
                warn!("Cached value for '{}' has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Typed write stamped with the current time.
    pub async fn set_as<T: Serialize + Debug + ?Sized>(&self, key: &str, value: &T, ttl_seconds: u64) {
        self.set(key, to_cache_value(value), Utc::now(), ttl_seconds)
            .await;
    }

    pub async fn delete(&self, key: &str) {
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.delete(key).await {
                warn!("Durable cache delete failed for '{}': {}", key, e);
                Counters::bump(&self.counters.durable_errors);
            }
        }
        self.memory.remove(key);
    }

    /// Remove keys matching a glob pattern from both tiers independently.
    ///
    /// `"*"` clears everything. Returns the number of keys removed where the
    /// backend reports it (a durable flush does not).
    pub async fn clear(&self, pattern: &str) -> usize {
        let glob = match GlobPattern::new(pattern) {
            Ok(glob) => glob,
            Err(e) => {
                warn!("Ignoring cache clear: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        if let Some(durable) = &self.durable {
            let result = if glob.is_match_all() {
                durable.flush().await.map(|_| 0)
            } else {
                durable.delete_matching(glob.as_str()).await
            };
            match result {
                Ok(count) => removed += count,
                Err(e) => {
                    warn!("Durable cache clear '{}' failed: {}", pattern, e);
                    Counters::bump(&self.counters.durable_errors);
                }
            }
        }

        removed += if glob.is_match_all() {
            self.memory.clear()
        } else {
            self.memory.remove_matching(&glob)
        };

        debug!("Cleared {} cache keys matching '{}'", removed, pattern);
        removed
    }

    /// Sweep the memory tier. The durable tier relies on native expiry.
    pub fn cleanup_expired(&self, max_age: Duration) -> usize {
        let removed = self.memory.cleanup_expired(max_age, Utc::now());
        if removed > 0 {
            debug!("Removed {} expired memory cache entries", removed);
        }
        removed
    }

    pub async fn health_check(&self) -> CacheHealth {
        let memory_entries = self.memory.len();
        let Some(durable) = &self.durable else {
            return CacheHealth {
                durable_configured: false,
                durable_backend: None,
                durable_connected: false,
                durable_latency_ms: None,
                durable_error: None,
                memory_entries,
            };
        };

        let started = Instant::now();
        let ping = durable.ping().await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match ping {
            Ok(()) => CacheHealth {
                durable_configured: true,
                durable_backend: Some(durable.name().to_string()),
                durable_connected: true,
                durable_latency_ms: Some(latency_ms),
                durable_error: None,
                memory_entries,
            },
            Err(e) => CacheHealth {
                durable_configured: true,
                durable_backend: Some(durable.name().to_string()),
                durable_connected: false,
                durable_latency_ms: None,
                durable_error: Some(e.to_string()),
                memory_entries,
            },
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            durable_errors: self.counters.durable_errors.load(Ordering::Relaxed),
            memory_fallback_writes: self.counters.memory_fallback_writes.load(Ordering::Relaxed),
            memory_entries: self.memory.len(),
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::memory_only()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    /// Durable tier kept in a map, recording the native expiry of each write.
    #[derive(Default)]
    pub struct MapStore {
        pub records: Mutex<HashMap<String, (String, Duration)>>,
    }

    #[async_trait::async_trait]
    impl DurableStore for MapStore {
        fn name(&self) -> &'static str {
            "map"
        }

        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            Ok(self.records.lock().unwrap().get(key).map(|(p, _)| p.clone()))
        }

        async fn set_with_expiry(
            &self,
            key: &str,
            payload: String,
            expiry: Duration,
        ) -> Result<(), CacheError> {
            self.records
                .lock()
                .unwrap()
                .insert(key.to_string(), (payload, expiry));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            self.records.lock().unwrap().remove(key);
            Ok(())
        }

        async fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError> {
            let glob = GlobPattern::new(pattern)?;
            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|k, _| !glob.matches(k));
            Ok(before - records.len())
        }

        async fn flush(&self) -> Result<(), CacheError> {
            self.records.lock().unwrap().clear();
            Ok(())
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    /// Durable tier that is never reachable.
    pub struct DownStore;

    #[async_trait::async_trait]
    impl DurableStore for DownStore {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn set_with_expiry(&self, _: &str, _: String, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn delete_matching(&self, _pattern: &str) -> Result<usize, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn flush(&self) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }
}
