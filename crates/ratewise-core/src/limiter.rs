//! Rate limiter orchestration over a counter store.
//!
//! The limiter owns no counters itself. Each check derives the current window,
//! asks the store for an increment and turns the returned count into a
//! [`Decision`]. Backend faults never reach the caller:
//!
//! - a shared store that reports `BackendUnavailable` is retried once against
//!   the local store, for that check only; the next check tries the shared
//!   store again.
//! - if counting fails entirely the request is allowed with no remaining quota.

use std::sync::Arc;

use crate::domain::{BackendMode, Decision, Quota, RateLimitKey, WindowId};
use crate::error::StoreError;
use crate::ports::{Clock, CounterStore};

/// Result of one attempt to count a request against one store.
#[derive(Debug)]
enum Attempt {
    Counted(u64),
    Unavailable(String),
    /// The increment task panicked or was cancelled by the runtime.
    Aborted(String),
}

/// Fixed-window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    mode: BackendMode,
    primary: Arc<dyn CounterStore>,
    local: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    quota: Quota,
}

impl RateLimiter {
    /// Limiter counting in process memory only.
    pub fn local(local: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, quota: Quota) -> Self {
        Self {
            mode: BackendMode::Local,
            primary: local.clone(),
            local,
            clock,
            quota,
        }
    }

    /// Limiter counting in a shared store, degrading to `local` per check
    /// while the shared store is unavailable.
    pub fn shared(
        shared: Arc<dyn CounterStore>,
        local: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        quota: Quota,
    ) -> Self {
        Self {
            mode: BackendMode::Shared,
            primary: shared,
            local,
            clock,
            quota,
        }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    /// Default quota applied by [`check`](Self::check).
    pub fn quota(&self) -> &Quota {
        &self.quota
    }

    /// Seconds until the default quota's current window ends.
    pub fn reset_after_secs(&self) -> u64 {
        self.quota.window().reset_after(self.clock.now())
    }

    /// Count a request for `key` against the default quota.
    pub async fn check(&self, key: &RateLimitKey) -> Decision {
        self.check_with(key, &self.quota).await
    }

    /// Count a request for `key` against `quota`.
    pub async fn check_with(&self, key: &RateLimitKey, quota: &Quota) -> Decision {
        let now = self.clock.now();
        let window = quota.window().window_id(now);

        match self
            .count(key, window, quota.window().window_seconds())
            .await
        {
            Some(count) => {
                let decision = Decision::from_count(count, quota, now);
                tracing::trace!(
                    key = %key,
                    window = %window,
                    count,
                    allowed = decision.allowed,
                    "Rate limit checked"
                );
                decision
            }
            None => Decision::fail_open(quota, now),
        }
    }

    /// Current count for `key` in the default quota's window, without
    /// counting a request. Diagnostic only.
    pub async fn peek(&self, key: &RateLimitKey) -> Option<u64> {
        self.peek_with(key, &self.quota).await
    }

    pub async fn peek_with(&self, key: &RateLimitKey, quota: &Quota) -> Option<u64> {
        let window = quota.window().window_id(self.clock.now());

        match self.primary.peek(key, window).await {
            Ok(count) => count,
            Err(StoreError::BackendUnavailable(reason)) => {
                tracing::debug!(key = %key, reason = %reason, "Peek failed on primary store");
                if self.mode == BackendMode::Shared {
                    self.local.peek(key, window).await.ok().flatten()
                } else {
                    None
                }
            }
        }
    }

    async fn count(&self, key: &RateLimitKey, window: WindowId, window_seconds: u64) -> Option<u64> {
        match Self::attempt(&self.primary, key, window, window_seconds).await {
            Attempt::Counted(count) => return Some(count),
            Attempt::Unavailable(reason) if self.mode == BackendMode::Shared => {
                tracing::warn!(
                    key = %key,
                    reason = %reason,
                    "Shared counter store unavailable, counting locally"
                );
            }
            Attempt::Unavailable(reason) | Attempt::Aborted(reason) => {
                tracing::error!(key = %key, reason = %reason, "Rate limit counting failed, failing open");
                return None;
            }
        }

        match Self::attempt(&self.local, key, window, window_seconds).await {
            Attempt::Counted(count) => Some(count),
            Attempt::Unavailable(reason) | Attempt::Aborted(reason) => {
                tracing::error!(
                    key = %key,
                    reason = %reason,
                    "Local counter store failed, failing open"
                );
                None
            }
        }
    }

    async fn attempt(
        store: &Arc<dyn CounterStore>,
        key: &RateLimitKey,
        window: WindowId,
        window_seconds: u64,
    ) -> Attempt {
        let result = match store.mode() {
            // Network round trip: run it on its own task so the increment still
            // lands if the request that triggered it is dropped mid-flight.
            BackendMode::Shared => {
                let store = store.clone();
                let key = key.clone();
                let task = tokio::spawn(async move {
                    store.increment(&key, window, window_seconds).await
                });
                match task.await {
                    Ok(result) => result,
                    Err(e) => return Attempt::Aborted(e.to_string()),
                }
            }
            // In-memory increments complete on first poll.
            BackendMode::Local => store.increment(key, window, window_seconds).await,
        };

        match result {
            Ok(count) => Attempt::Counted(count),
            Err(StoreError::BackendUnavailable(reason)) => Attempt::Unavailable(reason),
        }
    }
}
