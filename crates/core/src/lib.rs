//! # cacheaside Core
//!
//! Cache-aside logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces: [`KeyValueStore`] and [`Loader`]
//! - The stored-blob codec ([`CacheEnvelope`])
//! - [`DistributedLock`] built on the store's atomic primitives
//! - [`RebuildExecutor`] implementations for background repopulation
//! - [`CacheClient`], the three read strategies and the write operations
//!
//! ## Architecture Principles
//! - Only depends on `cacheaside-common` and `cacheaside-domain`
//! - Stores are reached through traits; adapters live in `cacheaside-infra`
//! - Time comes from an injected clock and background work from an injected
//!   executor, so every strategy is testable deterministically

pub mod cache;
pub mod lock;
pub mod rebuild;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::codec::CacheEnvelope;
pub use cache::ports::{KeyValueStore, LoadResult, Loader};
pub use cache::{CacheClient, CacheClientBuilder, CacheStats};
pub use lock::{DistributedLock, LockLease};
pub use rebuild::{rebuild_pool, InlineExecutor, RebuildExecutor, RebuildJob};
