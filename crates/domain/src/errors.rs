//! Error types used throughout the cache

use thiserror::Error;

/// Boxed error returned by loaders and store adapters
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for cacheaside
///
/// "Not found" is deliberately absent: an authoritative absence is `Ok(None)`
/// and a failed lock acquisition is `Ok(None)` from the lock. Only conditions
/// the caller has to react to are errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Store error during '{operation}': {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: BoxedError,
    },

    #[error("Codec error for key '{key}': {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The loader failed; the failure is never negative-cached.
    #[error("Loader failed for key '{key}': {source}")]
    Loader {
        key: String,
        #[source]
        source: BoxedError,
    },

    #[error("Lock for key '{key}' still held elsewhere after {attempts} attempts")]
    LockContention { key: String, attempts: u32 },

    #[error("Wait for key '{key}' interrupted by shutdown")]
    Interrupted { key: String },

    #[error("Rebuild executor saturated (capacity {capacity})")]
    ExecutorSaturated { capacity: usize },

    #[error("Rebuild executor is shut down")]
    ExecutorShutdown,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// Wrap a backend failure for the given store operation.
    pub fn store<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<BoxedError>,
    {
        Self::Store { operation, source: source.into() }
    }

    pub fn codec(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Codec { key: key.into(), source }
    }

    pub fn loader(key: impl Into<String>, source: BoxedError) -> Self {
        Self::Loader { key: key.into(), source }
    }

    /// Whether repeating the same call may succeed.
    ///
    /// Contention, saturation and backend hiccups are transient; codec and
    /// configuration problems are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store { .. }
                | Self::Loader { .. }
                | Self::LockContention { .. }
                | Self::ExecutorSaturated { .. }
        )
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display_names_operation() {
        let err = CacheError::store("get", std::io::Error::other("connection reset"));
        assert_eq!(err.to_string(), "Store error during 'get': connection reset");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CacheError::LockContention { key: "shop:1".into(), attempts: 3 }.is_retryable());
        assert!(CacheError::ExecutorSaturated { capacity: 4 }.is_retryable());
        assert!(!CacheError::ExecutorShutdown.is_retryable());
        assert!(!CacheError::Config("bad".into()).is_retryable());

        let codec = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(!CacheError::codec("shop:1", codec).is_retryable());
    }
}
