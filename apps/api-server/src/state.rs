//! Application state - shared across all handlers.

use std::sync::Arc;

use ratewise_core::ports::{Clock, SystemClock};
use ratewise_core::{Quota, RateLimiter, StoreError};
use ratewise_infra::InMemoryCounterStore;

#[cfg(feature = "redis")]
use ratewise_infra::RedisCounterStore;

use crate::config::AppConfig;
use crate::middleware::{ClientKeyExtractor, ForwardedForKeyExtractor, PeerIpKeyExtractor};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub limiter: RateLimiter,
    /// Local counters: the whole store in local mode, the fallback in shared
    /// mode. Swept by the background scheduler either way.
    pub local_store: Arc<InMemoryCounterStore>,
    pub key_extractor: Arc<dyn ClientKeyExtractor>,
    #[cfg(feature = "redis")]
    pub shared_store: Option<Arc<RedisCounterStore>>,
}

impl AppState {
    /// Build the application state, choosing the counter backend once.
    ///
    /// With `REDIS_URL` set the limiter counts in Redis; if Redis cannot be
    /// reached at startup it counts locally when fallback is allowed, and
    /// refuses to start otherwise.
    pub async fn new(config: &AppConfig) -> Result<Self, StoreError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let quota = config.rate_limit.quota;
        let key_extractor: Arc<dyn ClientKeyExtractor> = if config.rate_limit.trust_forwarded {
            Arc::new(ForwardedForKeyExtractor)
        } else {
            Arc::new(PeerIpKeyExtractor)
        };

        #[cfg(feature = "redis")]
        let state = match &config.redis {
            Some(redis_config) => match RedisCounterStore::new(redis_config.clone()).await {
                Ok(shared) => {
                    let shared = Arc::new(shared);
                    let local_store = Arc::new(InMemoryCounterStore::with_clock(clock.clone()));
                    Self {
                        limiter: RateLimiter::shared(
                            shared.clone(),
                            local_store.clone(),
                            clock,
                            quota,
                        ),
                        local_store,
                        key_extractor,
                        shared_store: Some(shared),
                    }
                }
                Err(e) if redis_config.fallback_to_memory => {
                    tracing::error!(
                        "Failed to connect to Redis: {}. Using in-memory rate limiting.",
                        e
                    );
                    Self::in_memory(clock, quota, key_extractor)
                }
                Err(e) => return Err(e),
            },
            None => {
                tracing::warn!("REDIS_URL not set. Rate limits are per process (in-memory mode).");
                Self::in_memory(clock, quota, key_extractor)
            }
        };

        #[cfg(not(feature = "redis"))]
        let state = {
            tracing::info!("Running without redis feature - using in-memory rate limiting");
            Self::in_memory(clock, quota, key_extractor)
        };

        tracing::info!(
            backend = %state.limiter.mode(),
            limit = quota.limit(),
            window_seconds = quota.window().window_seconds(),
            "Application state initialized"
        );

        Ok(state)
    }

    /// State counting in process memory only.
    pub fn in_memory(
        clock: Arc<dyn Clock>,
        quota: Quota,
        key_extractor: Arc<dyn ClientKeyExtractor>,
    ) -> Self {
        let local_store = Arc::new(InMemoryCounterStore::with_clock(clock.clone()));
        Self {
            limiter: RateLimiter::local(local_store.clone(), clock, quota),
            local_store,
            key_extractor,
            #[cfg(feature = "redis")]
            shared_store: None,
        }
    }
}
