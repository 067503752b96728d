//! Cache key and stored-value vocabulary

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{LOCK_KEY_PREFIX, NULL_MARKER};

/// Address of one cached item: caller prefix followed by the entity id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build `prefix + id`; no separator is inserted.
    pub fn new(prefix: &str, id: impl fmt::Display) -> Self {
        Self(format!("{prefix}{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the rebuild lock guarding this key.
    ///
    /// The lock record itself lives at `lock:` + this name.
    pub fn lock_name(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Store key of the lock record for `name`.
pub fn lock_record_key(name: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{name}")
}

/// Classification of the raw string a store returned for a cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredSlot<'a> {
    /// Key absent from the store
    Miss,
    /// Negative-cache entry for an id the loader reported absent
    NullMarker,
    /// Serialized value or envelope
    Value(&'a str),
}

impl<'a> StoredSlot<'a> {
    pub fn classify(raw: Option<&'a str>) -> Self {
        match raw {
            None => Self::Miss,
            Some(NULL_MARKER) => Self::NullMarker,
            Some(value) => Self::Value(value),
        }
    }
}
