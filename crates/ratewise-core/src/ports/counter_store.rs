//! Counter store port.

use async_trait::async_trait;

use crate::domain::{BackendMode, RateLimitKey, WindowId};
use crate::error::StoreError;

/// Counter store trait - abstraction over shared (Redis) and local counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter for `(key, window)` and return the
    /// post-increment count.
    ///
    /// A counter that does not exist yet (never seen, or expired) starts at 1
    /// and expires one window after `window` ends. Concurrent increments of
    /// the same counter must never be lost.
    async fn increment(
        &self,
        key: &RateLimitKey,
        window: WindowId,
        window_seconds: u64,
    ) -> Result<u64, StoreError>;

    /// Read the counter for `(key, window)` without modifying it.
    async fn peek(&self, key: &RateLimitKey, window: WindowId) -> Result<Option<u64>, StoreError>;

    /// Kind of backend this store talks to.
    fn mode(&self) -> BackendMode;
}
