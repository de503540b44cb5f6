//! In-memory counter store - the local fallback when Redis is unavailable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use ratewise_core::domain::{BackendMode, RateLimitKey, WindowId, WindowPolicy, unix_seconds};
use ratewise_core::ports::{Clock, CounterStore, SystemClock};
use ratewise_core::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    key: RateLimitKey,
    window: WindowId,
}

#[derive(Debug)]
struct CounterEntry {
    count: u64,
    /// Unix second at or after which the entry counts as absent.
    expires_at: u64,
}

/// Process-local fixed-window counters in a sharded concurrent map.
///
/// Increments take the shard lock for one entry only, so callers on
/// different keys rarely contend. Expired entries are ignored on access and
/// reclaimed by [`sweep`](Self::sweep).
///
/// Note: counts are per process. Two instances of the same deployment keep
/// independent counters; use the Redis store for fleet-wide limits.
pub struct InMemoryCounterStore {
    entries: DashMap<CounterKey, CounterEntry>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Swept expired counters");
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` on a background task for
    /// as long as the runtime lives.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.sweep();
            }
        })
    }

    /// Number of entries currently held, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn now(&self) -> u64 {
        unix_seconds(self.clock.now())
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(
        &self,
        key: &RateLimitKey,
        window: WindowId,
        window_seconds: u64,
    ) -> Result<u64, StoreError> {
        let now = self.now();
        let expires_at = WindowPolicy::new(window_seconds)
            .map_err(|e| StoreError::BackendUnavailable(e.to_string()))?
            .expires_at(window);

        let mut entry = self
            .entries
            .entry(CounterKey {
                key: key.clone(),
                window,
            })
            .or_insert(CounterEntry {
                count: 0,
                expires_at,
            });

        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = expires_at;
        }
        entry.count += 1;

        Ok(entry.count)
    }

    async fn peek(&self, key: &RateLimitKey, window: WindowId) -> Result<Option<u64>, StoreError> {
        let now = self.now();
        let lookup = CounterKey {
            key: key.clone(),
            window,
        };

        match self.entries.get(&lookup) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.count)),
            Some(_) => {}
            None => return Ok(None),
        }

        // Expired: drop it now rather than waiting for the sweep.
        self.entries
            .remove_if(&lookup, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    fn mode(&self) -> BackendMode {
        BackendMode::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratewise_core::ports::ManualClock;
    use ratewise_core::{Quota, RateLimiter};

    const T0: i64 = 1_700_000_040; // aligned to a 60s window
    const W0: WindowId = WindowId(1_700_000_040 / 60);

    fn key(name: &str) -> RateLimitKey {
        RateLimitKey::new(name).unwrap()
    }

    fn store_at(secs: i64) -> (Arc<InMemoryCounterStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(secs));
        let store = Arc::new(InMemoryCounterStore::with_clock(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn test_first_increment_starts_at_one() {
        let (store, _) = store_at(T0);
        let window = W0;

        assert_eq!(store.increment(&key("a"), window, 60).await.unwrap(), 1);
        assert_eq!(store.increment(&key("a"), window, 60).await.unwrap(), 2);
        assert_eq!(store.increment(&key("a"), WindowId(W0.0 + 1), 60).await.unwrap(), 1);
        assert_eq!(store.mode(), BackendMode::Local);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent() {
        let (store, clock) = store_at(600);
        let window = WindowId(10); // [600, 660), expires at 720

        store.increment(&key("a"), window, 60).await.unwrap();
        clock.set(719);
        assert_eq!(store.peek(&key("a"), window).await.unwrap(), Some(1));

        clock.set(720);
        assert_eq!(store.peek(&key("a"), window).await.unwrap(), None);
        assert!(store.is_empty(), "peek reclaims the expired entry");

        // A late increment on an expired counter starts over.
        store.increment(&key("a"), window, 60).await.unwrap();
        clock.set(800);
        assert_eq!(store.increment(&key("a"), window, 60).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_reclaims_only_expired_entries() {
        let (store, clock) = store_at(600);

        store.increment(&key("old"), WindowId(10), 60).await.unwrap();
        store.increment(&key("other"), WindowId(10), 60).await.unwrap();
        clock.set(730);
        store.increment(&key("fresh"), WindowId(12), 60).await.unwrap();
        assert_eq!(store.len(), 3);

        assert_eq!(store.sweep(), 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.peek(&key("fresh"), WindowId(12)).await.unwrap(), Some(1));
        assert_eq!(store.sweep(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_increments_lose_no_updates() {
        let (store, _) = store_at(T0);
        let window = W0;

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..250 {
                        store.increment(&key("hot"), window, 60).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.peek(&key("hot"), window).await.unwrap(), Some(64 * 250));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_across_keys() {
        let (store, _) = store_at(T0);
        let window = W0;

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let name = format!("client-{}", i % 4);
                    for _ in 0..100 {
                        store.increment(&key(&name), window, 60).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..4 {
            let name = format!("client-{}", i);
            assert_eq!(store.peek(&key(&name), window).await.unwrap(), Some(1_000));
        }
    }

    #[tokio::test]
    async fn test_limiter_scenario_alice_and_bob() {
        let (store, clock) = store_at(T0);
        let limiter = RateLimiter::local(store.clone(), clock.clone(), Quota::new(5, 60).unwrap());

        let decisions: Vec<_> = check_n(&limiter, "alice", 6).await;
        assert_eq!(
            decisions.iter().map(|d| d.allowed).collect::<Vec<_>>(),
            vec![true, true, true, true, true, false]
        );
        assert_eq!(
            decisions.iter().map(|d| d.remaining).collect::<Vec<_>>(),
            vec![4, 3, 2, 1, 0, 0]
        );

        let bob = limiter.check(&key("bob")).await;
        assert!(bob.allowed);
        assert_eq!(bob.remaining, 4);

        clock.advance(60);
        let fresh = limiter.check(&key("alice")).await;
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 4);

        // Both windows of alice plus bob's window are still within grace.
        assert_eq!(store.len(), 3);
        clock.advance(120);
        assert_eq!(store.sweep(), 3);
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_in_background() {
        let (store, clock) = store_at(T0);
        for i in 0..20 {
            store.increment(&key(&format!("client-{}", i)), W0, 60).await.unwrap();
        }
        clock.advance(180);

        let sweeper = store.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(150)).await;
        sweeper.abort();

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_zero_window_is_rejected_by_store() {
        let (store, _) = store_at(T0);
        let result = store.increment(&key("a"), W0, 0).await;
        assert!(matches!(result, Err(StoreError::BackendUnavailable(_))));
        assert!(store.is_empty());
    }

    async fn check_n(
        limiter: &RateLimiter,
        name: &str,
        n: usize,
    ) -> Vec<ratewise_core::Decision> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(limiter.check(&key(name)).await);
        }
        out
    }
}
