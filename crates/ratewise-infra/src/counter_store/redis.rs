//! Redis counter store - fixed-window counters shared by every instance.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};

use ratewise_core::StoreError;
use ratewise_core::domain::{BackendMode, RateLimitKey, WindowId};
use ratewise_core::ports::CounterStore;

/// Redis connection configuration.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis URL (e.g., redis://localhost:6379)
    pub url: String,
    /// Bound on establishing the initial connection
    pub connect_timeout: Duration,
    /// Bound on every counter command
    pub command_timeout: Duration,
    /// Prefix for counter keys
    pub key_prefix: String,
    /// Whether to start with local counting if Redis is unreachable at startup
    pub fallback_to_memory: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            connect_timeout: Duration::from_millis(1000),
            command_timeout: Duration::from_millis(100),
            key_prefix: "rl".to_string(),
            fallback_to_memory: true,
        }
    }
}

impl RedisConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` when `REDIS_URL` is not set, meaning local counting only.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("REDIS_URL").ok()?;
        let defaults = Self::default();

        Some(Self {
            url,
            connect_timeout: Duration::from_millis(
                std::env::var("REDIS_CONNECT_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            command_timeout: Duration::from_millis(
                std::env::var("REDIS_COMMAND_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(100),
            ),
            key_prefix: std::env::var("REDIS_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            fallback_to_memory: std::env::var("REDIS_FALLBACK_TO_MEMORY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.fallback_to_memory),
        })
    }
}

/// Storage key for a counter: `{prefix}:{key}:{window}`.
fn storage_key(prefix: &str, key: &RateLimitKey, window: WindowId) -> String {
    format!("{}:{}:{}", prefix, key, window)
}

/// Redis-backed fixed-window counters.
///
/// Each `(key, window)` pair maps to its own Redis key, so a window's counter
/// is never reset by EXPIRE races from a neighbouring window.
pub struct RedisCounterStore {
    conn: ConnectionManager,
    config: RedisConfig,
    /// Lua script for atomic increment with expiry
    increment_script: Script,
}

impl RedisCounterStore {
    pub async fn new(config: RedisConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| StoreError::BackendUnavailable(e.to_string()))?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::BackendUnavailable("Connection timed out".to_string()))?
            .map_err(|e| StoreError::BackendUnavailable(e.to_string()))?;

        // INCR, then set the TTL on first touch. The TTL check also repairs a
        // counter that somehow lost its expiry.
        let increment_script = Script::new(
            r#"
            local current = redis.call('INCR', KEYS[1])
            if current == 1 or redis.call('TTL', KEYS[1]) == -1 then
                redis.call('EXPIRE', KEYS[1], ARGV[1])
            end
            return current
            "#,
        );

        tracing::info!(url = %config.url, "Connected to Redis counter store");

        Ok(Self {
            conn,
            config,
            increment_script,
        })
    }

    /// Liveness check used by the health endpoint.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _pong: String = tokio::time::timeout(
            self.config.command_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::BackendUnavailable("Command timed out".to_string()))?
        .map_err(|e| StoreError::BackendUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(
        &self,
        key: &RateLimitKey,
        window: WindowId,
        window_seconds: u64,
    ) -> Result<u64, StoreError> {
        let redis_key = storage_key(&self.config.key_prefix, key, window);
        // Window plus one window of grace.
        let ttl_secs = window_seconds.saturating_mul(2);
        let mut conn = self.conn.clone();

        let count: i64 = tokio::time::timeout(
            self.config.command_timeout,
            self.increment_script
                .key(&redis_key)
                .arg(ttl_secs)
                .invoke_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::BackendUnavailable("Command timed out".to_string()))?
        .map_err(|e| StoreError::BackendUnavailable(e.to_string()))?;

        Ok(count.max(1) as u64)
    }

    async fn peek(&self, key: &RateLimitKey, window: WindowId) -> Result<Option<u64>, StoreError> {
        let redis_key = storage_key(&self.config.key_prefix, key, window);
        let mut conn = self.conn.clone();

        tokio::time::timeout(
            self.config.command_timeout,
            conn.get::<_, Option<u64>>(&redis_key),
        )
        .await
        .map_err(|_| StoreError::BackendUnavailable("Command timed out".to_string()))?
        .map_err(|e| StoreError::BackendUnavailable(e.to_string()))
    }

    fn mode(&self) -> BackendMode {
        BackendMode::Shared
    }
}
