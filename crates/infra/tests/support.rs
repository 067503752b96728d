#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use cacheaside_common::{MockClock, WorkerPool, WorkerPoolConfig};
use cacheaside_core::{CacheClient, InlineExecutor, LoadResult, Loader, RebuildExecutor};
use cacheaside_domain::CacheSettings;
use cacheaside_infra::InMemoryStore;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

/// Ids at or above this value do not exist in the backing "database".
pub const MISSING_ID_FLOOR: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shop {
    pub id: u64,
    pub name: String,
}

impl Shop {
    pub fn new(id: u64, name: &str) -> Self {
        Self { id, name: name.to_string() }
    }

    /// What the loader returns for `id`
    pub fn current(id: u64) -> Self {
        Self::new(id, &format!("shop-{id}"))
    }
}

/// Loader standing in for a slow repository; counts its calls
#[derive(Debug, Clone)]
pub struct ShopRepository {
    calls: Arc<AtomicUsize>,
    withdrawn: Arc<AtomicBool>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
}

impl ShopRepository {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            withdrawn: Arc::new(AtomicBool::new(false)),
            delay: Duration::ZERO,
            gate: None,
        }
    }

    /// Every load sleeps for `delay` first
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every load waits for a permit of `gate` first
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Make every shop disappear from the repository, or bring them back
    pub fn set_withdrawn(&self, withdrawn: bool) {
        self.withdrawn.store(withdrawn, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Loader<u64, Shop> for ShopRepository {
    fn load(&self, id: u64) -> impl Future<Output = LoadResult<Shop>> + Send {
        let repo = self.clone();
        async move {
            repo.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &repo.gate {
                let _permit = gate.acquire().await?;
            }
            if !repo.delay.is_zero() {
                tokio::time::sleep(repo.delay).await;
            }
            let exists = id < MISSING_ID_FLOOR && !repo.withdrawn.load(Ordering::SeqCst);
            Ok(exists.then(|| Shop::current(id)))
        }
    }
}

/// Client over an in-memory store whose TTLs and envelope expiry follow a
/// shared mock clock
pub struct TestCache {
    pub store: InMemoryStore,
    pub clock: MockClock,
    pub client: CacheClient,
}

impl TestCache {
    pub fn inline(settings: CacheSettings) -> Self {
        Self::with_executor(settings, Arc::new(InlineExecutor::new()))
    }

    pub fn with_executor(settings: CacheSettings, executor: Arc<dyn RebuildExecutor>) -> Self {
        let clock = MockClock::starting_at(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        let client = CacheClient::builder(Arc::new(store.clone()))
            .clock(Arc::new(clock.clone()))
            .executor(executor)
            .settings(settings)
            .build()
            .expect("valid settings");
        Self { store, clock, client }
    }
}

pub fn worker_pool(workers: usize, queue_capacity: usize) -> Arc<WorkerPool> {
    let config = WorkerPoolConfig::builder()
        .name("test-rebuild")
        .workers(workers)
        .queue_capacity(queue_capacity)
        .build()
        .expect("valid pool config");
    Arc::new(WorkerPool::new(config).expect("pool starts"))
}

/// Settings with a short mutex retry interval and a generous attempt budget
pub fn fast_retry() -> CacheSettings {
    CacheSettings { retry_interval_ms: 5, max_lock_attempts: 400, ..CacheSettings::default() }
}
