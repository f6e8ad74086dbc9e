//! In-memory counter store - used as fallback when Redis is unavailable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use windowgate_core::ports::{CounterStore, CounterStoreError};

/// How often [`InMemoryCounterStore::spawn_purger`] sweeps by default.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(60);

struct Counter {
    count: u64,
    expires_at: Instant,
}

impl Counter {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory counter store using a HashMap behind an async Mutex.
///
/// Every operation holds the lock for its whole read-modify-write, so
/// increments are atomic within the process.
/// Note: Counters are per-process, not shared across instances.
///
/// Expired counters are only replaced when their key is used again. Run
/// [`spawn_purger`](Self::spawn_purger) so keys that are never revisited
/// are reclaimed.
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Drop counters whose window has elapsed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        let before = counters.len();
        counters.retain(|_, counter| !counter.is_expired(now));
        before - counters.len()
    }

    /// Run [`purge_expired`](Self::purge_expired) every `every` in a
    /// background task. The task ends once the store is dropped.
    pub fn spawn_purger(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        let every = every.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    tracing::debug!("Counter store dropped, purger stopping");
                    break;
                };

                let purged = store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired counters");
                }
            }
        })
    }

    /// Number of live (unexpired) counters.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let counters = self.counters.lock().await;
        counters.values().filter(|c| !c.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterStoreError> {
        let now = Instant::now();
        let expires_at = now.checked_add(window).ok_or_else(|| {
            CounterStoreError::Operation(format!("window of {window:?} is out of range"))
        })?;
        let mut counters = self.counters.lock().await;

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at,
        });

        if counter.is_expired(now) {
            counter.count = 0;
            counter.expires_at = expires_at;
        }

        counter.count += 1;
        Ok(counter.count)
    }

    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>, CounterStoreError> {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;

        let Some(counter) = counters.get(key) else {
            return Ok(None);
        };
        if !counter.is_expired(now) {
            return Ok(Some(counter.expires_at - now));
        }

        // Clean up expired counter
        counters.remove(key);
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_increment_counts_within_window() {
        let store = InMemoryCounterStore::new();
        let window = Duration::from_secs(10);

        assert_eq!(store.increment("a", window).await.unwrap(), 1);
        assert_eq!(store.increment("a", window).await.unwrap(), 2);
        assert_eq!(store.increment("b", window).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_is_set_on_first_increment_only() {
        let store = InMemoryCounterStore::new();
        let window = Duration::from_secs(10);

        store.increment("a", window).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        store.increment("a", window).await.unwrap();

        let ttl = store.time_to_live("a").await.unwrap();
        assert_eq!(ttl, Some(Duration::from_secs(6)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_resets_after_window() {
        let store = InMemoryCounterStore::new();
        let window = Duration::from_secs(1);

        store.increment("a", window).await.unwrap();
        store.increment("a", window).await.unwrap();
        tokio::time::advance(window).await;

        assert_eq!(store.time_to_live("a").await.unwrap(), None);
        assert_eq!(store.increment("a", window).await.unwrap(), 1);
        assert_eq!(store.time_to_live("a").await.unwrap(), Some(window));
    }

    #[tokio::test]
    async fn test_missing_key_has_no_ttl() {
        let store = InMemoryCounterStore::new();
        assert_eq!(store.time_to_live("missing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = InMemoryCounterStore::new();

        store.increment("short", Duration::from_secs(1)).await.unwrap();
        store.increment("long", Duration::from_secs(60)).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.len().await, 1);
        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(!store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_window_is_an_error() {
        let store = InMemoryCounterStore::new();

        let result = store.increment("huge", Duration::MAX).await;
        assert!(matches!(result, Err(CounterStoreError::Operation(_))));
        assert_eq!(store.time_to_live("huge").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purger_reclaims_abandoned_keys() {
        let store = Arc::new(InMemoryCounterStore::new());
        let handle = store.spawn_purger(Duration::from_secs(1));

        for i in 0..1000 {
            store
                .increment(&format!("key:{i}"), Duration::from_secs(1))
                .await
                .unwrap();
        }
        assert_eq!(store.counters.lock().await.len(), 1000);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.counters.lock().await.len(), 0);

        // The purger does not keep the store alive.
        drop(store);
        let stopped = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(stopped.is_ok());
    }
}
