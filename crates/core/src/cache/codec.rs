//! Stored blob encoding
//!
//! Plain entries are the JSON encoding of the value. Logical-expiry entries
//! wrap the value in an envelope:
//!
//! ```json
//! {"data": {"id": 2, "name": "Harbor Noodles"}, "expireTime": 1718000000000}
//! ```
//!
//! `expireTime` is epoch milliseconds. JSON never encodes a value as the empty
//! string, so encoded blobs cannot collide with the null marker.

use std::time::Duration;

use cacheaside_common::Clock;
use cacheaside_domain::{CacheError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Value plus the instant after which readers must treat it as stale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEnvelope<T> {
    pub data: T,
    #[serde(rename = "expireTime")]
    pub expire_at_millis: u64,
}

impl<T> CacheEnvelope<T> {
    pub fn new(data: T, expire_at_millis: u64) -> Self {
        Self { data, expire_at_millis }
    }

    /// Envelope expiring `ttl` after the clock's current time
    pub fn expiring_after(data: T, clock: &dyn Clock, ttl: Duration) -> Self {
        let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        Self::new(data, clock.millis_since_epoch().saturating_add(ttl_millis))
    }

    /// Fresh while `now` is strictly before the expiry instant
    pub fn is_fresh_at(&self, now_millis: u64) -> bool {
        now_millis < self.expire_at_millis
    }
}

/// Encode a value as the blob stored under `key`
pub fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| CacheError::codec(key, source))
}

/// Decode the blob stored under `key`
pub fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|source| CacheError::codec(key, source))
}
