//! Domain-level error types.

use thiserror::Error;

/// Configuration errors - invalid quota or key parameters.
///
/// These are raised while loading settings or building a
/// [`Quota`](crate::domain::Quota) or a
/// [`RateLimitKey`](crate::domain::RateLimitKey), never per request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Window length must be a positive number of seconds, got {0}")]
    InvalidWindow(u64),

    #[error("Request limit must be at least 1, got {0}")]
    InvalidLimit(u32),

    #[error("Rate limit key must not be empty")]
    EmptyKey,

    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: String, value: String },
}

/// Counter store errors.
///
/// `BackendUnavailable` is the only failure a store may report. Unknown or
/// expired counters are not errors: they count as a first touch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Counter backend unavailable: {0}")]
    BackendUnavailable(String),
}
