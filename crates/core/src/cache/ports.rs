//! Port interfaces for the cache
//!
//! These traits define the boundaries between the cache logic and the
//! backing store / authoritative data source.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use cacheaside_domain::{BoxedError, Result};

/// TTL-capable key-value store shared by every cache client and lock holder
///
/// Implementations must be safe for concurrent use; the cache adds no
/// in-process locking around them. `set_if_absent` and `compare_and_delete`
/// must be atomic with respect to every other caller of the same store,
/// including callers in other processes.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Some("")` is a stored empty string, not a miss.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any existing one. `None` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Write only if the key is absent; returns whether this call wrote it.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Remove a key; returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Reset the TTL of an existing key; returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remove `key` only if it currently holds `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;
}

/// Outcome of a loader call
///
/// `Ok(None)` is an authoritative "does not exist" and gets negative-cached;
/// `Err` is a failed lookup and is never cached.
pub type LoadResult<T> = std::result::Result<Option<T>, BoxedError>;

/// Fetches the authoritative value for an id on cache miss or expiry
///
/// Implemented for every `Fn(Id) -> impl Future<Output = LoadResult<T>>`, so
/// a closure is usually enough:
///
/// ```rust
/// use cacheaside_core::{LoadResult, Loader};
///
/// async fn find_name(id: u64) -> LoadResult<String> {
///     Ok((id == 1).then(|| "Sunrise Cafe".to_string()))
/// }
///
/// fn assert_loader<L: Loader<u64, String>>(_: &L) {}
/// assert_loader(&find_name);
/// ```
pub trait Loader<Id, T>: Send + Sync {
    fn load(&self, id: Id) -> impl Future<Output = LoadResult<T>> + Send;
}

impl<Id, T, F, Fut> Loader<Id, T> for F
where
    F: Fn(Id) -> Fut + Send + Sync,
    Fut: Future<Output = LoadResult<T>> + Send,
{
    fn load(&self, id: Id) -> impl Future<Output = LoadResult<T>> + Send {
        self(id)
    }
}
