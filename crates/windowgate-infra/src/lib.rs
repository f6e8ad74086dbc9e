//! # Windowgate Infrastructure
//!
//! Concrete counter stores for the ports defined in `windowgate-core`, and
//! the `RateLimiter` that coordinates callers through them.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory store only
//! - `redis` - Redis-backed counter store shared across processes

pub mod counter_store;
pub mod rate_limit;

// Re-exports - In-Memory
pub use counter_store::{DEFAULT_PURGE_INTERVAL, InMemoryCounterStore};
pub use rate_limit::RateLimiter;

// Re-exports - Redis
#[cfg(feature = "redis")]
pub use counter_store::{RedisConfig, RedisCounterStore, RedisCounterStoreConfig};
