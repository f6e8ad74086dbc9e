//! Redis counter store implementation - shared fixed-window counters.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use windowgate_core::domain::MAX_WINDOW_SECS;
use windowgate_core::ports::{CounterStore, CounterStoreError};

/// Atomic increment with expiry. Re-arms the expiry if the key somehow lost
/// it, so a counter can never outlive its window.
/// Returns the post-increment count.
const INCREMENT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 or redis.call('PTTL', KEYS[1]) == -1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Whether to fallback to the in-memory store if Redis is unavailable
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_secs(5),
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            connect_timeout: Duration::from_secs(
                std::env::var("REDIS_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

/// Redis counter store configuration.
#[derive(Debug, Clone)]
pub struct RedisCounterStoreConfig {
    /// Redis connection config
    pub redis: RedisConfig,
    /// Key prefix for counter keys
    pub key_prefix: String,
}

impl Default for RedisCounterStoreConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            key_prefix: "ratelimit".to_string(),
        }
    }
}

impl RedisCounterStoreConfig {
    pub fn from_env() -> Self {
        Self {
            redis: RedisConfig::from_env(),
            key_prefix: std::env::var("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|_| "ratelimit".to_string()),
        }
    }
}

/// Redis-backed counter store, shared by every process using the same
/// server and key prefix.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    config: RedisCounterStoreConfig,
    script: Script,
}

impl RedisCounterStore {
    pub async fn new(config: RedisCounterStoreConfig) -> Result<Self, CounterStoreError> {
        let client = Client::open(config.redis.url.as_str())
            .map_err(|e| CounterStoreError::Connection(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.redis.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| CounterStoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| CounterStoreError::Connection(e.to_string()))?;

        tracing::info!(
            url = %config.redis.url,
            prefix = %config.key_prefix,
            "Connected to Redis counter store"
        );

        Ok(Self {
            conn,
            config,
            script: Script::new(INCREMENT_SCRIPT),
        })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, CounterStoreError> {
        Self::new(RedisCounterStoreConfig::from_env()).await
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterStoreError> {
        // Checked before INCR so a rejected call never leaves a counter
        // without an expiry.
        if window > Duration::from_secs(MAX_WINDOW_SECS) {
            return Err(CounterStoreError::Operation(format!(
                "window of {window:?} is out of range"
            )));
        }

        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();
        let window_ms = (window.as_millis() as u64).max(1);

        let count: u64 = self
            .script
            .key(&redis_key)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CounterStoreError::Operation(e.to_string()))?;

        Ok(count)
    }

    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>, CounterStoreError> {
        let redis_key = self.make_key(key);
        let mut conn = self.conn.clone();

        let pttl: i64 = conn
            .pttl(&redis_key)
            .await
            .map_err(|e| CounterStoreError::Operation(e.to_string()))?;

        // -2: no such key. -1: key without expiry; report it as due so the
        // next increment re-arms the expiry.
        match pttl {
            -2 => Ok(None),
            -1 => Ok(Some(Duration::ZERO)),
            ms => Ok(Some(Duration::from_millis(ms.max(0) as u64))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_test_store() -> Option<RedisCounterStore> {
        let config = RedisCounterStoreConfig {
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
                connect_timeout: Duration::from_secs(1),
                fallback_to_memory: false,
            },
            key_prefix: "test_ratelimit".to_string(),
        };

        RedisCounterStore::new(config).await.ok()
    }

    fn unique_key(name: &str) -> String {
        format!("{}:{}", name, uuid::Uuid::new_v4())
    }

    #[tokio::test]
    async fn test_redis_increment_and_ttl() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => {
                tracing::warn!("Redis not available, skipping test");
                return;
            }
        };

        let key = unique_key("incr");
        let window = Duration::from_secs(2);

        assert_eq!(store.time_to_live(&key).await.unwrap(), None);
        assert_eq!(store.increment(&key, window).await.unwrap(), 1);
        assert_eq!(store.increment(&key, window).await.unwrap(), 2);

        let ttl = store.time_to_live(&key).await.unwrap().unwrap();
        assert!(ttl <= window);
        assert!(ttl > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_redis_counter_expires() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = unique_key("expiry");
        let window = Duration::from_secs(1);

        store.increment(&key, window).await.unwrap();
        store.increment(&key, window).await.unwrap();

        // Wait for reset
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.time_to_live(&key).await.unwrap(), None);
        assert_eq!(store.increment(&key, window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redis_increment_rearms_missing_expiry() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = unique_key("no_expiry");
        let window = Duration::from_secs(5);

        // Counter written by another client without an expiry.
        let mut conn = store.conn.clone();
        conn.set::<_, _, ()>(store.make_key(&key), 5).await.unwrap();
        assert_eq!(store.time_to_live(&key).await.unwrap(), Some(Duration::ZERO));

        assert_eq!(store.increment(&key, window).await.unwrap(), 6);

        let ttl = store.time_to_live(&key).await.unwrap().unwrap();
        assert!(ttl > Duration::ZERO && ttl <= window);
    }

    #[tokio::test]
    async fn test_redis_rejects_out_of_range_window() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        let key = unique_key("huge");

        let result = store.increment(&key, Duration::MAX).await;
        assert!(matches!(result, Err(CounterStoreError::Operation(_))));
        assert_eq!(store.time_to_live(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_concurrent_increments_are_atomic() {
        let store = match get_test_store().await {
            Some(s) => std::sync::Arc::new(s),
            None => return,
        };

        let key = unique_key("race");
        let window = Duration::from_secs(5);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move { store.increment(&key, window).await.unwrap() })
            })
            .collect();

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();

        assert_eq!(counts, (1..=20).collect::<Vec<u64>>());
    }
}
