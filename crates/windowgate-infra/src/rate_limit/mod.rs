//! Fixed-window rate limiting over a shared counter store.

mod limiter;

pub use limiter::{DEFAULT_MIN_BACKOFF, RateLimiter};
