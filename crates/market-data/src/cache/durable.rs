use std::time::Duration;

use async_trait::async_trait;

use super::CacheError;

/// The shared, TTL-capable backing tier of [`CacheStore`](super::CacheStore).
///
/// Payloads are opaque encoded records. Implementations only move bytes and
/// report connectivity problems as [`CacheError::Backend`].
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Short backend name for health reports ("redis").
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a payload with a native expiry.
    async fn set_with_expiry(
        &self,
        key: &str,
        payload: String,
        expiry: Duration,
    ) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key matching a glob pattern. Returns the number removed.
    async fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Remove everything.
    async fn flush(&self) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}
