//! Wiring a [`CacheClient`] from configuration

use std::sync::Arc;

use cacheaside_core::{CacheClient, KeyValueStore};
use cacheaside_domain::{Config, Result, StoreSettings};
use tracing::info;

use crate::store::InMemoryStore;

/// Open the store selected by `settings`
///
/// # Errors
/// Returns `CacheError::Store` if the backend is unreachable and
/// `CacheError::Config` if it was compiled out.
pub async fn connect_store(settings: &StoreSettings) -> Result<Arc<dyn KeyValueStore>> {
    match settings {
        StoreSettings::Memory => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "redis")]
        StoreSettings::Redis { url } => Ok(Arc::new(crate::store::RedisStore::connect(url).await?)),
        #[cfg(not(feature = "redis"))]
        StoreSettings::Redis { .. } => Err(cacheaside_domain::CacheError::Config(
            "store backend 'redis' requires the `redis` feature of cacheaside-infra".to_string(),
        )),
    }
}

/// Validate `config`, open its store and build a client with a rebuild pool
///
/// Must be called from within a tokio runtime.
///
/// # Errors
/// Returns the first validation, connection or pool construction error.
pub async fn build_client(config: &Config) -> Result<CacheClient> {
    config.validate()?;
    let store = connect_store(&config.store).await?;
    let client = CacheClient::builder(store).settings(config.cache.clone()).build()?;

    info!(
        lock_owner = %client.lock().owner_id(),
        rebuild_workers = config.cache.rebuild_workers,
        "bootstrap.client_ready"
    );
    Ok(client)
}
