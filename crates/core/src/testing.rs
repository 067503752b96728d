//! Test doubles for the core crate

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cacheaside_domain::{CacheError, Result};
use parking_lot::Mutex;

use crate::cache::ports::KeyValueStore;
use crate::rebuild::{RebuildExecutor, RebuildJob};

/// Map-backed store that records TTLs instead of enforcing them
///
/// Tests simulate physical expiry with [`MockStore::remove`].
#[derive(Debug, Default)]
pub(crate) struct MockStore {
    entries: Mutex<HashMap<String, (String, Option<Duration>)>>,
    fail_writes: AtomicBool,
    gets: AtomicUsize,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.entries.lock().insert(key.to_string(), (value.to_string(), ttl));
    }

    pub(crate) fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub(crate) fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).map(|(value, _)| value.clone())
    }

    pub(crate) fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.lock().get(key).and_then(|(_, ttl)| *ttl)
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub(crate) fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Make every `set` fail with a store error
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::store("set", "mock store rejected write"));
        }
        self.insert(key, value, ttl);
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), (value.to_string(), Some(ttl)));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        Ok(self.entries.lock().get_mut(key).map(|entry| entry.1 = Some(ttl)).is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((current, _)) if current == expected => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Executor whose queue is always full
#[derive(Debug, Default)]
pub(crate) struct RejectingExecutor {
    rejected: AtomicUsize,
}

impl RejectingExecutor {
    pub(crate) fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RebuildExecutor for RejectingExecutor {
    async fn submit(&self, _job: RebuildJob) -> Result<()> {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::ExecutorSaturated { capacity: 0 })
    }

    async fn shutdown(&self) {}
}
