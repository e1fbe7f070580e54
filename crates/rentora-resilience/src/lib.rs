//! # Rentora Resilience
//!
//! Request admission for the Rentora scheduler's HTTP surface.
//! Provides a sliding-window rate limiter with a temporary block list.

pub mod error;
pub mod rate_limiter;

pub use error::*;
pub use rate_limiter::*;
