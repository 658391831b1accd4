//! Record encoding for the durable tier.
//!
//! A record carries the value together with its `stored_at` and
//! `ttl_seconds`, written as one JSON document so the three can never be
//! observed separately.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CacheEntry, CacheError};

#[derive(Serialize, Deserialize)]
struct Record {
    value: Value,
    stored_at: DateTime<Utc>,
    ttl_seconds: u64,
}

pub(crate) fn encode(entry: &CacheEntry) -> Result<String, CacheError> {
    let record = Record {
        value: entry.value.clone(),
        stored_at: entry.stored_at,
        ttl_seconds: entry.ttl_seconds,
    };
    serde_json::to_string(&record).map_err(|e| CacheError::Codec(e.to_string()))
}

pub(crate) fn decode(key: &str, payload: &str) -> Result<CacheEntry, CacheError> {
    let record: Record = serde_json::from_str(payload)
        .map_err(|e| CacheError::Codec(format!("{}: {}", key, e)))?;
    Ok(CacheEntry {
        key: key.to_string(),
        value: record.value,
        stored_at: record.stored_at,
        ttl_seconds: record.ttl_seconds,
    })
}

/// Convert any value into a cacheable JSON tree.
///
/// Values serde cannot represent as JSON (non-string map keys, for
/// instance) are stored as their `Debug` rendering instead of failing.
pub fn to_cache_value<T: Serialize + Debug + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            warn!("Cache value not representable as JSON ({}), storing as text", e);
            Value::String(format!("{:?}", value))
        }
    }
}
