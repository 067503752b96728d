//! # cacheaside Infrastructure
//!
//! Implementations of the core ports plus process wiring.
//!
//! This crate contains:
//! - [`InMemoryStore`], a process-local [`KeyValueStore`](cacheaside_core::KeyValueStore)
//! - `RedisStore` for a shared Redis instance (feature `redis`)
//! - Configuration loading from files and `CACHEASIDE_*` environment variables
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `cacheaside-core`
//! - Contains all code that touches the network, files or the environment

pub mod bootstrap;
pub mod config;
pub mod observability;
pub mod store;

pub use bootstrap::{build_client, connect_store};
pub use observability::init_tracing;
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::InMemoryStore;
