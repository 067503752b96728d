//! Async runtime building blocks
//!
//! - **Worker pool**: a fixed set of tokio workers draining a bounded job
//!   queue; submissions beyond the queue capacity are rejected instead of
//!   buffered.

pub mod worker_pool;

pub use worker_pool::{
    Job, JobError, WorkerPool, WorkerPoolConfig, WorkerPoolConfigBuilder, WorkerPoolError,
    WorkerPoolMetrics,
};
