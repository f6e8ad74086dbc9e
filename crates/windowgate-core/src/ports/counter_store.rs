//! Counter store port.

use async_trait::async_trait;
use std::time::Duration;

/// Counter store trait - shared expiring counters (Redis, in-memory).
///
/// Implementations must be safe under any number of concurrent writers to
/// the same key, including writers in other processes.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter for `key` and return the new count.
    ///
    /// When the increment creates the counter it expires after `window`.
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, CounterStoreError>;

    /// Remaining lifetime of the counter, or `None` if it does not exist.
    async fn time_to_live(&self, key: &str) -> Result<Option<Duration>, CounterStoreError>;
}

/// Counter store errors.
#[derive(Debug, thiserror::Error)]
pub enum CounterStoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}
