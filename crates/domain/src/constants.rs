//! Domain-level constants
//!
//! Defaults mirror the values the cache has historically run with; every one
//! of them can be overridden through [`crate::CacheSettings`].

/// Value written in place of a real entry when the loader reports absence.
pub const NULL_MARKER: &str = "";

/// Prefix of every lock record key.
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Physical TTL of a null marker, in seconds.
pub const DEFAULT_NULL_TTL_SECS: u64 = 120;

/// Physical TTL of a lock record, in seconds. Must exceed the slowest loader.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 10;

/// Sleep between lock attempts in the mutex read strategy.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 50;

/// Lock attempts before the mutex read strategy gives up.
pub const DEFAULT_MAX_LOCK_ATTEMPTS: u32 = 20;

// Rebuild worker pool
pub const DEFAULT_REBUILD_WORKERS: usize = 10;
pub const DEFAULT_REBUILD_QUEUE_CAPACITY: usize = 100;

pub const DEFAULT_LOG_LEVEL: &str = "info";
