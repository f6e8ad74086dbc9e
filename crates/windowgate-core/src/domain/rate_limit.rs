//! Rate limit policy.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Longest accepted window: one year.
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

/// How many operations may start within one fixed window.
///
/// Construction validates both values, so a `RateLimitOptions` in hand is
/// always usable. Serialized as `{ "rateLimit": .., "rateLimitWindow": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRateLimitOptions")]
pub struct RateLimitOptions {
    rate_limit: u32,
    rate_limit_window: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRateLimitOptions {
    rate_limit: u32,
    rate_limit_window: u64,
}

impl TryFrom<RawRateLimitOptions> for RateLimitOptions {
    type Error = DomainError;

    fn try_from(raw: RawRateLimitOptions) -> Result<Self, Self::Error> {
        Self::new(raw.rate_limit, raw.rate_limit_window)
    }
}

impl RateLimitOptions {
    /// `rate_limit` operations per `rate_limit_window` seconds.
    pub fn new(rate_limit: u32, rate_limit_window: u64) -> Result<Self, DomainError> {
        if rate_limit == 0 {
            return Err(DomainError::InvalidLimit);
        }
        if rate_limit_window == 0 || rate_limit_window > MAX_WINDOW_SECS {
            return Err(DomainError::InvalidWindow);
        }

        Ok(Self {
            rate_limit,
            rate_limit_window,
        })
    }

    /// Load options from environment variables.
    pub fn from_env() -> Result<Self, DomainError> {
        Self::new(
            std::env::var("RATE_LIMIT_MAX_REQUESTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),
            std::env::var("RATE_LIMIT_WINDOW_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        )
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn window_secs(&self) -> u64 {
        self.rate_limit_window
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window)
    }
}

/// Slack Web API rate limit tiers.
///
/// Slack publishes per-method quotas as calls per minute; each tier maps to
/// a fixed 60 second window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlackTier {
    Tier1,
    Tier2,
    Tier3,
    Tier4,
}

impl SlackTier {
    pub fn calls_per_minute(self) -> u32 {
        match self {
            Self::Tier1 => 1,
            Self::Tier2 => 20,
            Self::Tier3 => 50,
            Self::Tier4 => 100,
        }
    }

    pub fn options(self) -> RateLimitOptions {
        RateLimitOptions {
            rate_limit: self.calls_per_minute(),
            rate_limit_window: 60,
        }
    }
}

impl fmt::Display for SlackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tier = match self {
            Self::Tier1 => 1,
            Self::Tier2 => 2,
            Self::Tier3 => 3,
            Self::Tier4 => 4,
        };
        write!(f, "tier{tier}")
    }
}

impl FromStr for SlackTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let digit = normalized.strip_prefix("tier").unwrap_or(&normalized);

        match digit {
            "1" => Ok(Self::Tier1),
            "2" => Ok(Self::Tier2),
            "3" => Ok(Self::Tier3),
            "4" => Ok(Self::Tier4),
            _ => Err(DomainError::UnknownTier(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_limit() {
        assert_eq!(RateLimitOptions::new(0, 60), Err(DomainError::InvalidLimit));
    }

    #[test]
    fn test_rejects_zero_window() {
        assert_eq!(RateLimitOptions::new(5, 0), Err(DomainError::InvalidWindow));
    }

    #[test]
    fn test_rejects_oversized_window() {
        assert_eq!(
            RateLimitOptions::new(1, u64::MAX),
            Err(DomainError::InvalidWindow)
        );
        assert_eq!(
            RateLimitOptions::new(1, MAX_WINDOW_SECS + 1),
            Err(DomainError::InvalidWindow)
        );
        assert!(RateLimitOptions::new(1, MAX_WINDOW_SECS).is_ok());
    }

    #[test]
    fn test_window_duration() {
        let options = RateLimitOptions::new(2, 60).unwrap();
        assert_eq!(options.rate_limit(), 2);
        assert_eq!(options.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options: RateLimitOptions =
            serde_json::from_str(r#"{"rateLimit": 20, "rateLimitWindow": 60}"#).unwrap();
        assert_eq!(options, RateLimitOptions::new(20, 60).unwrap());

        let json = serde_json::to_value(options).unwrap();
        assert_eq!(json["rateLimit"], 20);
        assert_eq!(json["rateLimitWindow"], 60);
    }

    #[test]
    fn test_deserialize_validates() {
        let result: Result<RateLimitOptions, _> =
            serde_json::from_str(r#"{"rateLimit": 0, "rateLimitWindow": 60}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_slack_tiers() {
        assert_eq!(SlackTier::Tier2.options(), RateLimitOptions::new(20, 60).unwrap());
        assert_eq!("tier3".parse::<SlackTier>().unwrap(), SlackTier::Tier3);
        assert_eq!(" 4 ".parse::<SlackTier>().unwrap(), SlackTier::Tier4);
        assert_eq!(SlackTier::Tier1.to_string(), "tier1");
        assert!(matches!(
            "tier9".parse::<SlackTier>(),
            Err(DomainError::UnknownTier(_))
        ));
    }
}
