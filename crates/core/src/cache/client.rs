use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use cacheaside_common::runtime::JobError;
use cacheaside_common::{Clock, SystemClock};
use cacheaside_domain::constants::NULL_MARKER;
use cacheaside_domain::{CacheError, CacheKey, CacheSettings, Result, StoredSlot};
use futures::FutureExt;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::codec::{self, CacheEnvelope};
use super::metrics::{CacheMetrics, CacheStats};
use super::ports::{KeyValueStore, Loader};
use crate::lock::{DistributedLock, LockLease};
use crate::rebuild::{rebuild_pool, RebuildExecutor, RebuildJob};

/// Cache-aside client over a shared [`KeyValueStore`]
///
/// Cheap to clone; clones share the store, lock, executor and counters.
/// Keys are `prefix + id`. Entries written by [`write`](Self::write) are read
/// by the pass-through and mutex strategies; entries written by
/// [`write_with_logical_expiry`](Self::write_with_logical_expiry) are read by
/// the logical-expiry strategy. Reading an entry with the other family's
/// strategy fails with a codec error.
#[derive(Clone)]
pub struct CacheClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    store: Arc<dyn KeyValueStore>,
    lock: DistributedLock,
    executor: Arc<dyn RebuildExecutor>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    metrics: CacheMetrics,
    shutdown: CancellationToken,
}

enum Lookup<T> {
    Miss,
    Absent,
    Value(T),
}

impl CacheClient {
    pub fn builder(store: Arc<dyn KeyValueStore>) -> CacheClientBuilder {
        CacheClientBuilder::new(store)
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.inner.settings
    }

    /// Lock used to gate rebuilds; usable directly for other critical sections
    pub fn lock(&self) -> &DistributedLock {
        &self.inner.lock
    }

    /// Store `value` as JSON with a physical TTL, replacing any entry
    pub async fn write<T>(&self, key: impl AsRef<str>, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let key = key.as_ref();
        let raw = codec::encode(key, value)?;
        self.inner.store.set(key, &raw, Some(ttl)).await
    }

    /// Store `value` in an envelope that goes stale `ttl` from now
    ///
    /// The entry itself never expires physically; readers compare the
    /// envelope's expiry against the clock.
    pub async fn write_with_logical_expiry<T>(
        &self,
        key: impl AsRef<str>,
        value: &T,
        ttl: Duration,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.inner.write_envelope(key.as_ref(), value, ttl).await
    }

    /// Read through the cache, loading on miss
    ///
    /// A null marker answers `Ok(None)` without calling the loader. On a
    /// miss the loader's value is written with `ttl`; an authoritative
    /// absence writes a null marker with the configured null TTL. Loader
    /// errors are returned and nothing is cached.
    pub async fn read_pass_through<Id, T, L>(
        &self,
        prefix: &str,
        id: Id,
        loader: L,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        Id: fmt::Display,
        T: Serialize + DeserializeOwned,
        L: Loader<Id, T>,
    {
        let key = CacheKey::new(prefix, &id);
        match self.inner.lookup(&key).await? {
            Lookup::Value(value) => Ok(Some(value)),
            Lookup::Absent => Ok(None),
            Lookup::Miss => {
                self.inner.metrics.record_miss();
                debug!(key = %key, "cache.pass_through.miss");
                self.inner.load_and_store(&key, id, &loader, ttl).await
            }
        }
    }

    /// Read a pre-warmed entry, rebuilding expired ones in the background
    ///
    /// Never loads synchronously: a miss or null marker answers `Ok(None)`.
    /// An expired entry is returned as-is; if this caller wins the rebuild
    /// lock, a job that reloads the value and writes a fresh envelope `ttl`
    /// from its completion is handed to the executor. The lock is released
    /// when the job ends, or immediately if the executor refuses the job.
    ///
    /// An id the loader reports absent is stored as an envelope with
    /// `data: null`: it reads as `Ok(None)` and is reloaded once it expires,
    /// so an id that reappears at the source comes back into the cache.
    pub async fn read_with_logical_expiry<Id, T, L>(
        &self,
        prefix: &str,
        id: Id,
        loader: L,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        Id: fmt::Display + Send + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
        L: Loader<Id, T> + 'static,
    {
        let inner = &self.inner;
        let key = CacheKey::new(prefix, &id);

        let raw = inner.store.get(key.as_str()).await?;
        let envelope: CacheEnvelope<Option<T>> = match StoredSlot::classify(raw.as_deref()) {
            StoredSlot::Miss => {
                inner.metrics.record_miss();
                debug!(key = %key, "cache.logical.miss");
                return Ok(None);
            }
            StoredSlot::NullMarker => {
                inner.metrics.record_null_hit();
                return Ok(None);
            }
            StoredSlot::Value(raw) => codec::decode(key.as_str(), raw)?,
        };

        if envelope.is_fresh_at(inner.clock.millis_since_epoch()) {
            if envelope.data.is_some() {
                inner.metrics.record_hit();
            } else {
                inner.metrics.record_null_hit();
            }
            return Ok(envelope.data);
        }
        inner.metrics.record_stale_hit();

        let Some(lease) = inner.lock.acquire(key.lock_name(), inner.settings.lock_ttl()).await?
        else {
            inner.metrics.record_lock_contention();
            trace!(key = %key, "cache.logical.rebuild_in_progress");
            return Ok(envelope.data);
        };

        let job = rebuild_job(Arc::clone(inner), key.clone(), id, loader, ttl, lease.clone());
        match inner.executor.submit(job).await {
            Ok(()) => {
                inner.metrics.record_rebuild_submitted();
                debug!(key = %key, "cache.logical.rebuild_submitted");
            }
            Err(err) => {
                inner.metrics.record_rebuild_rejected();
                warn!(key = %key, error = %err, "cache.logical.rebuild_rejected");
                inner.release_quietly(lease).await;
            }
        }

        Ok(envelope.data)
    }

    /// Read through the cache, letting one caller at a time load a missing key
    ///
    /// Callers that lose the lock sleep for the retry interval and retry the
    /// whole read, up to the configured number of attempts, then fail with
    /// `LockContention`. The lock holder re-checks the store before loading,
    /// since the previous holder may have populated it. The lock is released
    /// whatever the load's outcome.
    pub async fn read_with_mutex<Id, T, L>(
        &self,
        prefix: &str,
        id: Id,
        loader: L,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        Id: fmt::Display,
        T: Serialize + DeserializeOwned,
        L: Loader<Id, T>,
    {
        let inner = &self.inner;
        let key = CacheKey::new(prefix, &id);
        let max_attempts = inner.settings.max_lock_attempts;
        let mut attempts = 0;

        loop {
            match inner.lookup(&key).await? {
                Lookup::Value(value) => return Ok(Some(value)),
                Lookup::Absent => return Ok(None),
                Lookup::Miss if attempts == 0 => {
                    inner.metrics.record_miss();
                    debug!(key = %key, "cache.mutex.miss");
                }
                Lookup::Miss => {}
            }

            attempts += 1;
            if let Some(lease) = inner.lock.acquire(key.lock_name(), inner.settings.lock_ttl()).await? {
                return inner.populate_under_lock(&key, id, &loader, ttl, lease).await;
            }
            inner.metrics.record_lock_contention();

            if attempts >= max_attempts {
                warn!(key = %key, attempts, "cache.mutex.contention_exhausted");
                return Err(CacheError::LockContention { key: key.into_inner(), attempts });
            }

            tokio::select! {
                () = inner.shutdown.cancelled() => {
                    debug!(key = %key, attempts, "cache.mutex.interrupted");
                    return Err(CacheError::Interrupted { key: key.into_inner() });
                }
                () = tokio::time::sleep(inner.settings.retry_interval()) => {}
            }
        }
    }

    /// Delete an entry; returns whether it existed
    pub async fn invalidate(&self, key: impl AsRef<str>) -> Result<bool> {
        let key = key.as_ref();
        let existed = self.inner.store.delete(key).await?;
        debug!(key = %key, existed, "cache.invalidated");
        Ok(existed)
    }

    /// Reset the physical TTL of an existing entry; returns whether it existed
    pub async fn refresh_ttl(&self, key: impl AsRef<str>, ttl: Duration) -> Result<bool> {
        self.inner.store.expire(key.as_ref(), ttl).await
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.metrics.snapshot()
    }

    /// Wake waiting mutex readers with `Interrupted` and drain the executor
    ///
    /// Affects every clone of this client.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.executor.shutdown().await;
        debug!("cache.client_stopped");
    }
}

impl ClientInner {
    async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Lookup<T>> {
        let raw = self.store.get(key.as_str()).await?;
        let lookup = match StoredSlot::classify(raw.as_deref()) {
            StoredSlot::Miss => Lookup::Miss,
            StoredSlot::NullMarker => {
                self.metrics.record_null_hit();
                trace!(key = %key, "cache.null_hit");
                Lookup::Absent
            }
            StoredSlot::Value(raw) => {
                self.metrics.record_hit();
                trace!(key = %key, "cache.hit");
                Lookup::Value(codec::decode(key.as_str(), raw)?)
            }
        };
        Ok(lookup)
    }

    async fn load<Id, T, L>(&self, key: &CacheKey, id: Id, loader: &L) -> Result<Option<T>>
    where
        L: Loader<Id, T>,
    {
        self.metrics.record_load();
        loader.load(id).await.map_err(|source| {
            self.metrics.record_load_failure();
            warn!(key = %key, error = %source, "cache.load_failed");
            CacheError::loader(key.as_str(), source)
        })
    }

    async fn load_and_store<Id, T, L>(
        &self,
        key: &CacheKey,
        id: Id,
        loader: &L,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        T: Serialize,
        L: Loader<Id, T>,
    {
        match self.load(key, id, loader).await? {
            Some(value) => {
                let raw = codec::encode(key.as_str(), &value)?;
                self.store.set(key.as_str(), &raw, Some(ttl)).await?;
                Ok(Some(value))
            }
            None => {
                self.write_null_marker(key).await?;
                Ok(None)
            }
        }
    }

    async fn populate_under_lock<Id, T, L>(
        &self,
        key: &CacheKey,
        id: Id,
        loader: &L,
        ttl: Duration,
        lease: LockLease,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        L: Loader<Id, T>,
    {
        let outcome = AssertUnwindSafe(self.populate(key, id, loader, ttl)).catch_unwind().await;
        self.release_quietly(lease).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Re-check the store, loading only if the holder before us left it empty
    async fn populate<Id, T, L>(
        &self,
        key: &CacheKey,
        id: Id,
        loader: &L,
        ttl: Duration,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        L: Loader<Id, T>,
    {
        match self.lookup(key).await? {
            Lookup::Value(value) => Ok(Some(value)),
            Lookup::Absent => Ok(None),
            Lookup::Miss => self.load_and_store(key, id, loader, ttl).await,
        }
    }

    async fn rebuild<Id, T, L>(&self, key: &CacheKey, id: Id, loader: &L, ttl: Duration) -> Result<()>
    where
        T: Serialize,
        L: Loader<Id, T>,
    {
        // A rebuild that finished between our stale read and our acquire
        // leaves a fresh envelope behind.
        if let Some(raw) = self.store.get(key.as_str()).await? {
            if let StoredSlot::Value(raw) = StoredSlot::classify(Some(raw.as_str())) {
                let current: CacheEnvelope<IgnoredAny> = codec::decode(key.as_str(), raw)?;
                if current.is_fresh_at(self.clock.millis_since_epoch()) {
                    debug!(key = %key, "cache.logical.already_rebuilt");
                    return Ok(());
                }
            }
        }

        let loaded = self.load(key, id, loader).await?;
        let found = loaded.is_some();
        let raw = self.envelope_blob(key.as_str(), &loaded, ttl)?;
        self.store.set(key.as_str(), &raw, None).await?;
        debug!(key = %key, found, "cache.logical.rebuilt");
        Ok(())
    }

    async fn write_envelope<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let raw = self.envelope_blob(key, value, ttl)?;
        self.store.set(key, &raw, None).await
    }

    fn envelope_blob<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        codec::encode(key, &CacheEnvelope::expiring_after(value, &*self.clock, ttl))
    }

    async fn write_null_marker(&self, key: &CacheKey) -> Result<()> {
        debug!(key = %key, "cache.null_marker_written");
        self.store.set(key.as_str(), NULL_MARKER, Some(self.settings.null_ttl())).await
    }

    /// Release a lease, leaving a failed release to the lock TTL
    async fn release_quietly(&self, lease: LockLease) {
        let name = lease.name().to_string();
        if let Err(err) = self.lock.release(lease).await {
            warn!(lock = %name, error = %err, "lock.release_failed");
        }
    }
}

fn rebuild_job<Id, T, L>(
    inner: Arc<ClientInner>,
    key: CacheKey,
    id: Id,
    loader: L,
    ttl: Duration,
    lease: LockLease,
) -> RebuildJob
where
    Id: Send + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
    L: Loader<Id, T> + 'static,
{
    async move {
        let outcome = AssertUnwindSafe(inner.rebuild::<Id, T, L>(&key, id, &loader, ttl)).catch_unwind().await;
        inner.release_quietly(lease).await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                inner.metrics.record_rebuild_failure();
                Err(JobError::from(err))
            }
            Err(panic) => {
                inner.metrics.record_rebuild_failure();
                std::panic::resume_unwind(panic)
            }
        }
    }
    .boxed()
}

impl fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheClient")
            .field("lock", &self.inner.lock)
            .field("settings", &self.inner.settings)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Builder for [`CacheClient`]
///
/// Everything but the store is optional: the clock defaults to the system
/// clock, the executor to a worker pool sized from the settings, and the
/// lock owner id to a random uuid.
pub struct CacheClientBuilder {
    store: Arc<dyn KeyValueStore>,
    clock: Option<Arc<dyn Clock>>,
    executor: Option<Arc<dyn RebuildExecutor>>,
    settings: CacheSettings,
    lock_owner: Option<String>,
}

impl CacheClientBuilder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, clock: None, executor: None, settings: CacheSettings::default(), lock_owner: None }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn RebuildExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn lock_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.lock_owner = Some(owner_id.into());
        self
    }

    /// Validate the settings and assemble the client
    ///
    /// Without an explicit executor this starts a worker pool, so it must be
    /// called from within a tokio runtime in that case.
    pub fn build(self) -> Result<CacheClient> {
        self.settings.validate()?;

        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(rebuild_pool(&self.settings)?),
        };
        let lock = match self.lock_owner {
            Some(owner) => DistributedLock::with_owner_id(Arc::clone(&self.store), owner),
            None => DistributedLock::new(Arc::clone(&self.store)),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(CacheClient {
            inner: Arc::new(ClientInner {
                store: self.store,
                lock,
                executor,
                clock,
                settings: self.settings,
                metrics: CacheMetrics::default(),
                shutdown: CancellationToken::new(),
            }),
        })
    }
}
