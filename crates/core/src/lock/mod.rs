//! Named, TTL-bounded mutual exclusion on top of a [`KeyValueStore`]
//!
//! [`KeyValueStore`]: crate::cache::ports::KeyValueStore

mod distributed;

pub use distributed::{DistributedLock, LockLease};
