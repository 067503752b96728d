//! Runtime utilities shared across cacheaside crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: clock abstraction (no async runtime)
//! - `runtime`: bounded worker pool on tokio, instrumented with tracing
//! - `test-utils`: async polling helpers for tests

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod runtime;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use runtime::{
    Job, JobError, WorkerPool, WorkerPoolConfig, WorkerPoolConfigBuilder, WorkerPoolError,
    WorkerPoolMetrics,
};
#[cfg(feature = "foundation")]
pub use time::{Clock, MockClock, SystemClock};
