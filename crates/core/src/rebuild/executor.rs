use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use cacheaside_common::runtime::{Job, WorkerPool, WorkerPoolConfig, WorkerPoolError};
use cacheaside_domain::{CacheError, CacheSettings, Result};
use futures::FutureExt;
use tracing::{error, instrument, warn};

/// A repopulation job; failures are reported through its output
pub type RebuildJob = Job;

/// Runs rebuild jobs off the reader's path
#[async_trait]
pub trait RebuildExecutor: Send + Sync {
    /// Hand over a job without waiting for it to run
    ///
    /// # Errors
    /// `ExecutorSaturated` when no capacity is left and `ExecutorShutdown`
    /// after [`shutdown`](Self::shutdown). The job is dropped in both cases.
    async fn submit(&self, job: RebuildJob) -> Result<()>;

    /// Refuse new jobs and wait for accepted ones to finish
    async fn shutdown(&self);
}

#[async_trait]
impl RebuildExecutor for WorkerPool {
    #[instrument(skip_all, fields(pool = %self.config().name))]
    async fn submit(&self, job: RebuildJob) -> Result<()> {
        self.try_submit(job).map_err(pool_error)
    }

    async fn shutdown(&self) {
        WorkerPool::shutdown(self).await;
    }
}

fn pool_error(err: WorkerPoolError) -> CacheError {
    match err {
        WorkerPoolError::QueueFull { capacity, .. } => CacheError::ExecutorSaturated { capacity },
        WorkerPoolError::Closed { .. } => CacheError::ExecutorShutdown,
        WorkerPoolError::InvalidConfig(message) => CacheError::Config(message),
    }
}

/// Worker pool sized from the cache settings
///
/// Must be called from within a tokio runtime.
pub fn rebuild_pool(settings: &CacheSettings) -> Result<WorkerPool> {
    let config = WorkerPoolConfig::builder()
        .name("cache-rebuild")
        .workers(settings.rebuild_workers)
        .queue_capacity(settings.rebuild_queue_capacity)
        .build()
        .map_err(CacheError::Config)?;
    WorkerPool::new(config).map_err(pool_error)
}

/// Executor that runs each job to completion inside `submit`
///
/// Makes logical-expiry reads deterministic in tests: the rebuild has
/// finished by the time the read returns.
#[derive(Debug, Default)]
pub struct InlineExecutor {
    closed: AtomicBool,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl InlineExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs that returned `Ok(())`
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Jobs that returned an error or panicked
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RebuildExecutor for InlineExecutor {
    async fn submit(&self, job: RebuildJob) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CacheError::ExecutorShutdown);
        }

        match AssertUnwindSafe(job).catch_unwind().await {
            Ok(Ok(())) => {
                self.completed.fetch_add(1, Ordering::AcqRel);
            }
            Ok(Err(err)) => {
                self.failed.fetch_add(1, Ordering::AcqRel);
                warn!(error = %err, "rebuild.job_failed");
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::AcqRel);
                error!("rebuild.job_panicked");
            }
        }
        Ok(())
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use cacheaside_common::runtime::JobError;
    use cacheaside_common::testing::poll_until;
    use tokio::sync::Notify;

    use super::*;

    fn settings(workers: usize, queue: usize) -> CacheSettings {
        CacheSettings {
            rebuild_workers: workers,
            rebuild_queue_capacity: queue,
            ..CacheSettings::default()
        }
    }

    #[tokio::test]
    async fn test_inline_runs_before_returning() {
        let executor = InlineExecutor::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        executor
            .submit(
                async move {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
                .boxed(),
            )
            .await
            .unwrap();

        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(executor.completed(), 1);
    }

    #[tokio::test]
    async fn test_inline_contains_failures() {
        let executor = InlineExecutor::new();

        executor.submit(async { Err::<(), JobError>("loader down".into()) }.boxed()).await.unwrap();
        let explode = true;
        executor
            .submit(
                async move {
                    if explode {
                        panic!("rebuild panicked");
                    }
                    Ok(())
                }
                .boxed(),
            )
            .await
            .unwrap();

        assert_eq!(executor.failed(), 2);
    }

    #[tokio::test]
    async fn test_inline_rejects_after_shutdown() {
        let executor = InlineExecutor::new();
        RebuildExecutor::shutdown(&executor).await;

        let err = executor.submit(async { Ok(()) }.boxed()).await.unwrap_err();
        assert!(matches!(err, CacheError::ExecutorShutdown));
    }

    #[tokio::test]
    async fn test_pool_maps_saturation() {
        let pool = rebuild_pool(&settings(1, 1)).unwrap();
        let gate = Arc::new(Notify::new());

        let blocker = Arc::clone(&gate);
        RebuildExecutor::submit(
            &pool,
            async move {
                blocker.notified().await;
                Ok(())
            }
            .boxed(),
        )
        .await
        .unwrap();

        let started = poll_until(Duration::from_secs(2), Duration::from_millis(5), || async {
            pool.metrics().active == 1
        })
        .await;
        assert!(started);

        RebuildExecutor::submit(&pool, async { Ok(()) }.boxed()).await.unwrap();
        let err = RebuildExecutor::submit(&pool, async { Ok(()) }.boxed()).await.unwrap_err();
        assert!(matches!(err, CacheError::ExecutorSaturated { capacity: 1 }));

        gate.notify_one();
        RebuildExecutor::shutdown(&pool).await;

        let err = RebuildExecutor::submit(&pool, async { Ok(()) }.boxed()).await.unwrap_err();
        assert!(matches!(err, CacheError::ExecutorShutdown));
        assert_eq!(pool.metrics().completed, 2);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let err = rebuild_pool(&settings(1, 0)).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }
}
