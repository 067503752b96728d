//! Process-local store
//!
//! Entries live in a sharded concurrent map. Deadlines are read from an
//! injected [`Clock`] and checked lazily on access; expired entries behave
//! exactly like absent ones and are removed when touched or swept by
//! [`InMemoryStore::purge_expired`].
//!
//! The conditional operations run under the shard lock of their key, which
//! makes them atomic for every caller sharing the same store instance. Locks
//! taken through this store therefore coordinate tasks of one process only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cacheaside_common::{Clock, SystemClock};
use cacheaside_core::KeyValueStore;
use cacheaside_domain::Result;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    deadline: Option<Instant>,
}

impl Entry {
    fn new(value: &str, ttl: Option<Duration>, now: Instant) -> Self {
        Self { value: value.to_string(), deadline: ttl.and_then(|ttl| deadline_after(now, ttl)) }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.deadline.map_or(true, |deadline| now < deadline)
    }
}

/// `None` (never expires) when `ttl` reaches past what `Instant` can represent
fn deadline_after(now: Instant, ttl: Duration) -> Option<Instant> {
    now.checked_add(ttl)
}

/// [`KeyValueStore`] backed by a [`DashMap`]
#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<DashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose TTLs follow `clock`, e.g. a `MockClock` in tests
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Arc::new(DashMap::new()), clock }
    }

    /// Number of stored entries, including expired ones not yet removed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaining TTL of a live entry; `None` if absent or without expiry
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.deadline)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            trace!(purged, "memory_store.purged");
        }
        purged
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").field("entries", &self.entries.len()).finish()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let live = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => None,
        };
        if live.is_none() {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(live)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let now = self.clock.now();
        self.entries.insert(key.to_string(), Entry::new(value, ttl, now));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let written = match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    false
                } else {
                    occupied.insert(Entry::new(value, Some(ttl), now));
                    true
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::new(value, Some(ttl), now));
                true
            }
        };
        Ok(written)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        Ok(self.entries.remove(key).is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if !entry.is_live(now) {
            drop(entry);
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
            return Ok(false);
        }
        entry.deadline = deadline_after(now, ttl);
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let now = self.clock.now();
        let removed =
            self.entries.remove_if(key, |_, entry| entry.is_live(now) && entry.value == expected);
        Ok(removed.is_some())
    }
}
