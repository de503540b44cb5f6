use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::window::WindowPolicy;
use crate::error::ConfigError;

/// Which kind of counter store backs a limiter. Selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Networked store shared by every process of the deployment.
    Shared,
    /// Process-local memory; counts are per process.
    Local,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Shared => f.write_str("shared"),
            BackendMode::Local => f.write_str("local"),
        }
    }
}

/// A validated request budget: at most `limit` requests per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    limit: u32,
    window: WindowPolicy,
}

impl Quota {
    pub fn new(limit: u32, window_seconds: u64) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::InvalidLimit(limit));
        }
        Ok(Self {
            limit,
            window: WindowPolicy::new(window_seconds)?,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> &WindowPolicy {
        &self.window
    }
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after_secs: u64,
    pub limit: u32,
}

impl Decision {
    /// Decision for a request that brought the window's counter to `count`.
    pub fn from_count(count: u64, quota: &Quota, now: DateTime<Utc>) -> Self {
        let limit = quota.limit();
        let remaining = u64::from(limit).saturating_sub(count);
        Self {
            allowed: count <= u64::from(limit),
            // remaining <= limit, which fits in u32
            remaining: remaining as u32,
            reset_after_secs: quota.window().reset_after(now),
            limit,
        }
    }

    /// Decision used when counting itself failed: let the request through
    /// but report no quota left.
    pub fn fail_open(quota: &Quota, now: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            remaining: 0,
            reset_after_secs: quota.window().reset_after(now),
            limit: quota.limit(),
        }
    }
}
