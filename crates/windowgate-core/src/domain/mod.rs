//! Domain types.

mod rate_limit;

pub use rate_limit::{MAX_WINDOW_SECS, RateLimitOptions, SlackTier};
