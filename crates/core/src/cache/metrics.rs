//! Cache client counters

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    null_hits: AtomicU64,
    stale_hits: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    rebuilds_submitted: AtomicU64,
    rebuilds_rejected: AtomicU64,
    rebuild_failures: AtomicU64,
    lock_contentions: AtomicU64,
}

macro_rules! record {
    ($($method:ident => $field:ident),* $(,)?) => {
        impl CacheMetrics {
            $(
                pub(crate) fn $method(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

record! {
    record_hit => hits,
    record_miss => misses,
    record_null_hit => null_hits,
    record_stale_hit => stale_hits,
    record_load => loads,
    record_load_failure => load_failures,
    record_rebuild_submitted => rebuilds_submitted,
    record_rebuild_rejected => rebuilds_rejected,
    record_rebuild_failure => rebuild_failures,
    record_lock_contention => lock_contentions,
}

impl CacheMetrics {
    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Acquire),
            misses: self.misses.load(Ordering::Acquire),
            null_hits: self.null_hits.load(Ordering::Acquire),
            stale_hits: self.stale_hits.load(Ordering::Acquire),
            loads: self.loads.load(Ordering::Acquire),
            load_failures: self.load_failures.load(Ordering::Acquire),
            rebuilds_submitted: self.rebuilds_submitted.load(Ordering::Acquire),
            rebuilds_rejected: self.rebuilds_rejected.load(Ordering::Acquire),
            rebuild_failures: self.rebuild_failures.load(Ordering::Acquire),
            lock_contentions: self.lock_contentions.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time copy of a client's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered with a fresh value
    pub hits: u64,
    /// Reads that found nothing in the store
    pub misses: u64,
    /// Reads answered by a null marker
    pub null_hits: u64,
    /// Logical-expiry reads that returned an expired value
    pub stale_hits: u64,
    /// Loader invocations
    pub loads: u64,
    /// Loader invocations that returned an error
    pub load_failures: u64,
    /// Background rebuilds handed to the executor
    pub rebuilds_submitted: u64,
    /// Background rebuilds the executor refused
    pub rebuilds_rejected: u64,
    /// Background rebuilds that failed or panicked
    pub rebuild_failures: u64,
    /// Lock attempts that found the lock held
    pub lock_contentions: u64,
}

impl CacheStats {
    /// Fraction of reads answered from the store (0.0 to 1.0)
    ///
    /// Fresh, stale and null-marker answers all count as hits.
    pub fn hit_rate(&self) -> f64 {
        let answered = self.hits + self.null_hits + self.stale_hits;
        let total = answered + self.misses;
        if total == 0 {
            return 0.0;
        }
        answered as f64 / total as f64
    }
}
