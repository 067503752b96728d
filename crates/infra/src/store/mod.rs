//! [`KeyValueStore`](cacheaside_core::KeyValueStore) adapters

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::InMemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
