//! Bounded worker pool for background jobs
//!
//! A fixed number of workers drain a bounded queue. Submission never waits:
//! when the queue is full the job is handed back as an error so the caller
//! can shed it, which keeps memory bounded no matter how fast jobs arrive.
//! Job failures and panics are caught, counted and logged; a failing job
//! never takes a worker down.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

/// Error type a job may fail with
pub type JobError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unit of work accepted by the pool
pub type Job = BoxFuture<'static, Result<(), JobError>>;

/// Configuration for worker pool behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Name used in logs
    pub name: String,
    /// Number of workers executing jobs concurrently
    pub workers: usize,
    /// Maximum number of jobs waiting for a worker
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { name: "worker-pool".to_string(), workers: 10, queue_capacity: 100 }
    }
}

impl WorkerPoolConfig {
    /// Create a new configuration builder
    pub fn builder() -> WorkerPoolConfigBuilder {
        WorkerPoolConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Builder for WorkerPoolConfig
#[derive(Debug)]
pub struct WorkerPoolConfigBuilder {
    config: WorkerPoolConfig,
}

impl Default for WorkerPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPoolConfigBuilder {
    pub fn new() -> Self {
        Self { config: WorkerPoolConfig::default() }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<WorkerPoolConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Errors returned by [`WorkerPool`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkerPoolError {
    #[error("worker pool '{name}' is full ({capacity} jobs queued)")]
    QueueFull { name: String, capacity: usize },

    #[error("worker pool '{name}' is shut down")]
    Closed { name: String },

    #[error("invalid worker pool configuration: {0}")]
    InvalidConfig(String),
}

/// Metrics for worker pool monitoring
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerPoolMetrics {
    /// Jobs accepted into the queue
    pub submitted: u64,
    /// Jobs refused because the queue was full or the pool closed
    pub rejected: u64,
    /// Jobs that finished with `Ok(())`
    pub completed: u64,
    /// Jobs that returned an error
    pub failed: u64,
    /// Jobs that panicked
    pub panicked: u64,
    /// Jobs currently running
    pub active: usize,
    /// Jobs waiting for a worker
    pub queued: usize,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl WorkerPoolMetrics {
    /// Fraction of workers currently busy (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        self.active as f64 / self.workers as f64
    }

    /// Fraction of submissions that were rejected (0.0 to 1.0)
    pub fn rejection_rate(&self) -> f64 {
        let total = self.submitted + self.rejected;
        if total == 0 {
            return 0.0;
        }
        self.rejected as f64 / total as f64
    }

    /// Jobs that have left the queue and finished, whatever the outcome
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.panicked
    }

    /// Check whether the next submission would be rejected
    pub fn is_saturated(&self) -> bool {
        self.queued >= self.queue_capacity
    }

    /// Get a human-readable status message
    pub fn status_message(&self) -> String {
        format!(
            "WorkerPool: {}/{} busy ({:.1}% utilized), {}/{} queued, {} rejected, {} failed",
            self.active,
            self.workers,
            self.utilization() * 100.0,
            self.queued,
            self.queue_capacity,
            self.rejected,
            self.failed + self.panicked
        )
    }
}

#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    active: AtomicUsize,
}

/// Fixed-size pool of tokio workers fed through a bounded queue
///
/// # Examples
///
/// ```rust
/// use cacheaside_common::runtime::{WorkerPool, WorkerPoolConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = WorkerPoolConfig::builder().workers(2).queue_capacity(8).build()?;
/// let pool = WorkerPool::new(config)?;
///
/// pool.spawn(async {
///     // background work
///     Ok(())
/// })?;
///
/// pool.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    config: WorkerPoolConfig,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    /// Start the workers. Must be called from within a tokio runtime.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, WorkerPoolError> {
        config.validate().map_err(WorkerPoolError::InvalidConfig)?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());

        let workers = (0..config.workers)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    config.name.clone(),
                    worker_id,
                    Arc::clone(&receiver),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        debug!(
            pool = %config.name,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "worker_pool.started"
        );

        Ok(Self { config, sender: Mutex::new(Some(sender)), workers: Mutex::new(workers), counters })
    }

    /// Create a pool with default configuration
    pub fn with_defaults() -> Result<Self, WorkerPoolError> {
        Self::new(WorkerPoolConfig::default())
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Queue a job without waiting
    ///
    /// Returns `QueueFull` when every queue slot is taken and `Closed` after
    /// [`shutdown`](Self::shutdown); the job is dropped in both cases.
    pub fn try_submit(&self, job: Job) -> Result<(), WorkerPoolError> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(WorkerPoolError::Closed { name: self.config.name.clone() });
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    pool = %self.config.name,
                    capacity = self.config.queue_capacity,
                    "worker_pool.rejected_full"
                );
                Err(WorkerPoolError::QueueFull {
                    name: self.config.name.clone(),
                    capacity: self.config.queue_capacity,
                })
            }
            Err(TrySendError::Closed(_)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                Err(WorkerPoolError::Closed { name: self.config.name.clone() })
            }
        }
    }

    /// Box and queue a future (see [`try_submit`](Self::try_submit))
    pub fn spawn<F>(&self, future: F) -> Result<(), WorkerPoolError>
    where
        F: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.try_submit(future.boxed())
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stop accepting jobs and wait for the queued ones to finish
    ///
    /// Idempotent; later calls return immediately.
    #[instrument(skip(self), fields(pool = %self.config.name))]
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());

        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "worker_pool.worker_join_failed");
            }
        }
        debug!("worker_pool.stopped");
    }

    /// Get worker pool metrics
    pub fn metrics(&self) -> WorkerPoolMetrics {
        let queued = self
            .sender
            .lock()
            .as_ref()
            .map(|sender| self.config.queue_capacity.saturating_sub(sender.capacity()))
            .unwrap_or(0);

        WorkerPoolMetrics {
            submitted: self.counters.submitted.load(Ordering::Acquire),
            rejected: self.counters.rejected.load(Ordering::Acquire),
            completed: self.counters.completed.load(Ordering::Acquire),
            failed: self.counters.failed.load(Ordering::Acquire),
            panicked: self.counters.panicked.load(Ordering::Acquire),
            active: self.counters.active.load(Ordering::Acquire),
            queued,
            workers: self.config.workers,
            queue_capacity: self.config.queue_capacity,
        }
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.config.name)
            .field("workers", &self.config.workers)
            .field("queue_capacity", &self.config.queue_capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run_worker(
    pool: String,
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    counters: Arc<PoolCounters>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        counters.active.fetch_add(1, Ordering::AcqRel);
        let outcome = AssertUnwindSafe(job).catch_unwind().await;
        counters.active.fetch_sub(1, Ordering::AcqRel);

        match outcome {
            Ok(Ok(())) => {
                counters.completed.fetch_add(1, Ordering::AcqRel);
            }
            Ok(Err(err)) => {
                counters.failed.fetch_add(1, Ordering::AcqRel);
                warn!(pool = %pool, worker = worker_id, error = %err, "worker_pool.job_failed");
            }
            Err(payload) => {
                counters.panicked.fetch_add(1, Ordering::AcqRel);
                error!(
                    pool = %pool,
                    worker = worker_id,
                    panic = %panic_message(payload.as_ref()),
                    "worker_pool.job_panicked"
                );
            }
        }
    }

    debug!(pool = %pool, worker = worker_id, "worker_pool.worker_exited");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
