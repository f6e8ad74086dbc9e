//! Counter store selection.

use std::sync::Arc;

use windowgate_core::ports::{CounterStore, CounterStoreError};
use windowgate_infra::{DEFAULT_PURGE_INTERVAL, InMemoryCounterStore};

#[cfg(feature = "redis")]
use windowgate_infra::{RedisCounterStore, RedisCounterStoreConfig};

/// Which backend the probe ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[cfg_attr(not(feature = "redis"), allow(dead_code))]
    Redis,
    InMemory,
}

/// Build the shared counter store.
///
/// Redis is used when `REDIS_URL` is set. If it cannot be reached the probe
/// falls back to the in-memory store unless `REDIS_FALLBACK_TO_MEMORY` is
/// disabled.
pub async fn build_store() -> Result<(Arc<dyn CounterStore>, Backend), CounterStoreError> {
    #[cfg(feature = "redis")]
    {
        if std::env::var("REDIS_URL").is_ok() {
            let config = RedisCounterStoreConfig::from_env();
            let fallback = config.redis.fallback_to_memory;

            match RedisCounterStore::new(config).await {
                Ok(store) => {
                    let store: Arc<dyn CounterStore> = Arc::new(store);
                    return Ok((store, Backend::Redis));
                }
                Err(e) if fallback => {
                    tracing::error!(
                        "Failed to connect to Redis: {}. Using in-memory fallback.",
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        } else {
            tracing::warn!("REDIS_URL not set. Limits apply to this process only.");
        }
    }

    #[cfg(not(feature = "redis"))]
    tracing::info!("Running without redis feature - using in-memory counter store");

    let store = Arc::new(InMemoryCounterStore::new());
    store.spawn_purger(DEFAULT_PURGE_INTERVAL);

    let store: Arc<dyn CounterStore> = store;
    Ok((store, Backend::InMemory))
}
