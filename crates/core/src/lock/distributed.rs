use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cacheaside_domain::{lock_record_key, Result};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::ports::KeyValueStore;

/// Proof of a successful [`DistributedLock::acquire`]
///
/// Cloning a lease does not extend ownership: whichever clone is released
/// first removes the record and later releases return `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    name: String,
    record_key: String,
    token: String,
}

impl LockLease {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store key holding the lock record
    pub fn record_key(&self) -> &str {
        &self.record_key
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// TTL-bounded lock whose records live in a shared [`KeyValueStore`]
///
/// Acquisition is a single atomic set-if-absent of `lock:<name>`; release
/// is an atomic compare-and-delete against the lease token, so a holder
/// whose record expired and was re-acquired by someone else cannot delete
/// the new holder's record. The TTL is the only bound on how long a crashed
/// holder blocks others.
///
/// Tokens are `<owner id>-<sequence>`. The owner id is random per lock
/// instance and the sequence increases on every acquisition attempt, so no
/// two attempts anywhere share a token.
pub struct DistributedLock {
    store: Arc<dyn KeyValueStore>,
    owner_id: String,
    sequence: AtomicU64,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_owner_id(store, Uuid::new_v4().simple().to_string())
    }

    /// Use a fixed owner id, e.g. a host name, to make lock records traceable
    pub fn with_owner_id(store: Arc<dyn KeyValueStore>, owner_id: impl Into<String>) -> Self {
        Self { store, owner_id: owner_id.into(), sequence: AtomicU64::new(0) }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn next_token(&self) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{sequence}", self.owner_id)
    }

    /// Try once to take the lock
    ///
    /// Returns `Ok(None)` if another holder owns it; failing to acquire is
    /// not an error.
    pub async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockLease>> {
        let record_key = lock_record_key(name);
        let token = self.next_token();

        if self.store.set_if_absent(&record_key, &token, ttl).await? {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            debug!(lock = %name, token = %token, ttl_ms, "lock.acquired");
            Ok(Some(LockLease { name: name.to_string(), record_key, token }))
        } else {
            debug!(lock = %name, "lock.contended");
            Ok(None)
        }
    }

    /// Release a lease
    ///
    /// Returns `false` if the record no longer carries the lease's token
    /// (it expired, possibly re-acquired by another holder); the record is
    /// left untouched in that case.
    pub async fn release(&self, lease: LockLease) -> Result<bool> {
        let removed = self.store.compare_and_delete(&lease.record_key, &lease.token).await?;
        if removed {
            debug!(lock = %lease.name, token = %lease.token, "lock.released");
        } else {
            warn!(lock = %lease.name, token = %lease.token, "lock.release_not_owner");
        }
        Ok(removed)
    }

    /// Extend a held lease; returns `false` if the record is gone
    ///
    /// Not atomic with respect to ownership: call it only while the lease's
    /// TTL has comfortably not elapsed.
    pub async fn extend(&self, lease: &LockLease, ttl: Duration) -> Result<bool> {
        match self.store.get(&lease.record_key).await? {
            Some(current) if current == lease.token => {
                self.store.expire(&lease.record_key, ttl).await
            }
            _ => Ok(false),
        }
    }
}

impl fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedLock")
            .field("owner_id", &self.owner_id)
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
