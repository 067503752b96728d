//! Configuration structures
//!
//! Plain serde types; loading from the environment or files lives in the
//! infra crate. Durations are stored as integer seconds / milliseconds so the
//! same structs read naturally from TOML, JSON and environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LOCK_TTL_SECS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_LOCK_ATTEMPTS, DEFAULT_NULL_TTL_SECS,
    DEFAULT_REBUILD_QUEUE_CAPACITY, DEFAULT_REBUILD_WORKERS, DEFAULT_RETRY_INTERVAL_MS,
};
use crate::errors::{CacheError, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

impl Config {
    /// Validate every section.
    ///
    /// # Errors
    /// Returns `CacheError::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.cache.validate()?;
        self.store.validate()
    }
}

/// Tuning knobs of the cache client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Physical TTL of the null marker written for absent ids
    pub null_ttl_secs: u64,
    /// Physical TTL of rebuild locks
    pub lock_ttl_secs: u64,
    /// Sleep between lock attempts in mutex reads
    pub retry_interval_ms: u64,
    /// Lock attempts before a mutex read fails
    pub max_lock_attempts: u32,
    /// Number of rebuild workers
    pub rebuild_workers: usize,
    /// Pending rebuild jobs accepted before submissions are rejected
    pub rebuild_queue_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            null_ttl_secs: DEFAULT_NULL_TTL_SECS,
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            max_lock_attempts: DEFAULT_MAX_LOCK_ATTEMPTS,
            rebuild_workers: DEFAULT_REBUILD_WORKERS,
            rebuild_queue_capacity: DEFAULT_REBUILD_QUEUE_CAPACITY,
        }
    }
}

impl CacheSettings {
    pub fn null_ttl(&self) -> Duration {
        Duration::from_secs(self.null_ttl_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Validate the settings
    ///
    /// # Errors
    /// Returns `CacheError::Config` if a TTL, the attempt budget or the pool
    /// size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.null_ttl_secs == 0 {
            return Err(CacheError::Config("null_ttl_secs must be greater than 0".to_string()));
        }
        if self.lock_ttl_secs == 0 {
            return Err(CacheError::Config("lock_ttl_secs must be greater than 0".to_string()));
        }
        if self.max_lock_attempts == 0 {
            return Err(CacheError::Config(
                "max_lock_attempts must be greater than 0".to_string(),
            ));
        }
        if self.rebuild_workers == 0 {
            return Err(CacheError::Config("rebuild_workers must be greater than 0".to_string()));
        }
        if self.rebuild_queue_capacity == 0 {
            return Err(CacheError::Config(
                "rebuild_queue_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which key-value backend to talk to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreSettings {
    /// Process-local store; locks only coordinate callers in this process
    #[default]
    Memory,
    /// Shared Redis instance
    Redis { url: String },
}

impl StoreSettings {
    fn validate(&self) -> Result<()> {
        match self {
            Self::Memory => Ok(()),
            Self::Redis { url } if url.trim().is_empty() => {
                Err(CacheError::Config("redis url must not be empty".to_string()))
            }
            Self::Redis { .. } => Ok(()),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}
