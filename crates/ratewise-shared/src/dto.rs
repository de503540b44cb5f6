//! Data Transfer Objects - response types for the API.

use serde::{Deserialize, Serialize};

/// Rate limit standing of the calling client in the current window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub key: String,
    /// `"shared"` or `"local"`.
    pub backend: String,
    pub limit: u32,
    pub window_seconds: u64,
    /// Requests counted so far in this window.
    pub used: u64,
    pub remaining: u32,
    pub reset_after_secs: u64,
}

/// Health check payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub rate_limit_backend: String,
    /// `None` when no shared store is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_store_reachable: Option<bool>,
}
