//! # Windowgate Core
//!
//! The domain layer of Windowgate.
//! This crate contains rate limit policy types and the ports the limiter
//! depends on, with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::DomainError;
