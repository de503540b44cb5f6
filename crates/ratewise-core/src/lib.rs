//! # Ratewise Core
//!
//! The domain layer of the Ratewise rate limiter.
//! This crate contains the window arithmetic, the counter store port and the
//! limiter orchestration. It has zero network dependencies.

pub mod domain;
pub mod error;
pub mod limiter;
pub mod ports;

pub use domain::{BackendMode, Decision, Quota, RateLimitKey, WindowId, WindowPolicy};
pub use error::{ConfigError, StoreError};
pub use limiter::RateLimiter;
