//! Fixed-window arithmetic.
//!
//! A window is a slice of wall-clock time `window_seconds` long, aligned to
//! the Unix epoch. Every timestamp maps to exactly one window, identified by
//! `floor(unix_seconds / window_seconds)`.
//!
//! Fixed windows allow a burst of up to twice the limit around a boundary: a
//! caller may spend a full quota at the end of one window and another full
//! quota at the start of the next. In exchange each check costs O(1) time and
//! each caller O(1) memory. A sliding log or token bucket would need a
//! different contract and is not what this policy implements.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::ConfigError;

/// Identifier of a fixed window. Non-decreasing as wall-clock time advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pure mapping from a timestamp to its window and the time left in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPolicy {
    window_seconds: u64,
}

impl WindowPolicy {
    /// Build a policy. A zero-length window is rejected here so that request
    /// handling never sees one.
    pub fn new(window_seconds: u64) -> Result<Self, ConfigError> {
        if window_seconds == 0 {
            return Err(ConfigError::InvalidWindow(window_seconds));
        }
        Ok(Self { window_seconds })
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_seconds
    }

    /// Window containing `now`.
    pub fn window_id(&self, now: DateTime<Utc>) -> WindowId {
        WindowId(unix_seconds(now) / self.window_seconds)
    }

    /// Whole seconds until the next window boundary, in `1..=window_seconds`.
    pub fn reset_after(&self, now: DateTime<Utc>) -> u64 {
        self.window_seconds - unix_seconds(now) % self.window_seconds
    }

    /// Unix second at which `id` begins.
    pub fn window_start(&self, id: WindowId) -> u64 {
        id.0.saturating_mul(self.window_seconds)
    }

    /// Unix second after which a counter for `id` may be discarded.
    ///
    /// One extra window of grace is kept past the window's end so that late
    /// readers near the boundary still find the counter.
    pub fn expires_at(&self, id: WindowId) -> u64 {
        self.window_start(id)
            .saturating_add(self.window_seconds.saturating_mul(2))
    }
}

/// Seconds since the Unix epoch, clamped at zero for pre-epoch timestamps.
pub fn unix_seconds(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp()).unwrap_or(0)
}
