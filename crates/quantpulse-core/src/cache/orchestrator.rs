//! Stale-while-revalidate policy on top of [`CacheStore`] and [`RequestCoalescer`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::coalescer::{PendingFetch, RequestCoalescer};
use super::key::{CacheKey, CachePolicies, CachePolicy, Category};
use super::store::{CacheStore, CategoryStats, Freshness};
use super::tasks::BackgroundTasks;
use super::CacheSettings;
use crate::FetchError;

/// Defines how a single lookup interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Serve fresh entries, serve stale entries while refreshing in the
    /// background, and fetch synchronously on a miss. (Default)
    #[default]
    Use,
    /// Skip the read, fetch through the coalescer and store the result.
    Refresh,
    /// Fetch without reading or writing the cache. Joins an in-flight
    /// storing execution when there is one; otherwise runs in a separate
    /// registry that cache readers never join.
    Bypass,
}

/// Cache counters exposed to calling layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    /// Share of lookups answered from the cache, fresh or stale.
    pub hit_rate: f64,
    pub background_task_count: usize,
    pub in_flight: usize,
    pub per_category: BTreeMap<Category, CategoryStats>,
}

/// Where a finished execution stores its value.
type StoreTarget<V> = (CacheStore<V>, CacheKey, CachePolicy);

/// Runs the producer, then stores its value when a target is given.
///
/// Executed inside the coalesced task, so the write happens even when every
/// waiter has given up.
async fn write_through<V, F, Fut>(
    target: Option<StoreTarget<V>>,
    producer: F,
) -> Result<Arc<V>, FetchError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, FetchError>>,
{
    let value = producer().await?;
    match target {
        Some((store, key, policy)) => Ok(store.put(key, value, policy).await),
        None => Ok(Arc::new(value)),
    }
}

/// Cache front door: fresh hits, stale-while-revalidate, coalesced misses.
#[derive(Debug)]
pub struct CacheOrchestrator<V> {
    store: CacheStore<V>,
    /// Executions that store their value.
    coalescer: RequestCoalescer<Arc<V>>,
    /// Bypass executions; nothing is stored.
    detached: RequestCoalescer<Arc<V>>,
    policies: CachePolicies,
    background: BackgroundTasks,
    fetch_timeout: Option<Duration>,
}

impl<V> Clone for CacheOrchestrator<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            coalescer: self.coalescer.clone(),
            detached: self.detached.clone(),
            policies: self.policies,
            background: self.background.clone(),
            fetch_timeout: self.fetch_timeout,
        }
    }
}

impl<V> Default for CacheOrchestrator<V>
where
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(&CacheSettings::default())
    }
}

impl<V> CacheOrchestrator<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            store: CacheStore::new(settings.max_entries),
            coalescer: RequestCoalescer::new(),
            detached: RequestCoalescer::new(),
            policies: settings.policies,
            background: BackgroundTasks::new(settings.max_background_tasks),
            fetch_timeout: settings.fetch_timeout,
        }
    }

    pub fn store(&self) -> &CacheStore<V> {
        &self.store
    }

    pub fn policies(&self) -> &CachePolicies {
        &self.policies
    }

    /// Returns the cached value for `key` or produces it.
    ///
    /// - fresh: returned without calling `producer`
    /// - stale: returned immediately; `producer` runs once in the background
    /// - absent or past max age: `producer` runs through the coalescer and
    ///   its value is stored under the category policy
    ///
    /// Producer failures are returned and never cached.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        key: CacheKey,
        producer: F,
    ) -> Result<Arc<V>, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        self.get_or_fetch_with(key, CacheMode::Use, producer).await
    }

    pub async fn get_or_fetch_with<F, Fut>(
        &self,
        key: CacheKey,
        mode: CacheMode,
        producer: F,
    ) -> Result<Arc<V>, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        if mode == CacheMode::Use {
            if let Some(entry) = self.store.get(&key).await {
                match entry.freshness {
                    Freshness::Fresh => {
                        tracing::debug!(key = %key, "cache hit");
                    }
                    Freshness::Stale => {
                        tracing::debug!(
                            key = %key,
                            age_ms = duration_ms(entry.age),
                            "serving stale entry"
                        );
                        self.schedule_refresh(key, producer);
                    }
                }
                return Ok(entry.value);
            }
            tracing::debug!(key = %key, "cache miss");
        }

        if mode == CacheMode::Bypass {
            let pending = match self.coalescer.join(&key) {
                Some(pending) => {
                    tracing::debug!(key = %key, "bypass joined in-flight fetch");
                    pending
                }
                None => {
                    let (pending, _) = self
                        .detached
                        .join_or_start(key, move || write_through(None, producer));
                    pending
                }
            };
            return self.await_shared(pending).await;
        }

        let target = self.store_target(&key);
        let (pending, started) = self
            .coalescer
            .join_or_start(key, move || write_through(Some(target), producer));
        if !started {
            tracing::debug!(key = %pending.key(), "joined in-flight fetch");
        }

        self.await_shared(pending).await
    }

    fn schedule_refresh<F, Fut>(&self, key: CacheKey, producer: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        if self.coalescer.is_pending(&key) {
            tracing::debug!(key = %key, "refresh already in flight");
            return;
        }

        let Some(permit) = self.background.try_acquire() else {
            tracing::warn!(
                key = %key,
                limit = self.background.limit(),
                "background refresh skipped, task set full or closed"
            );
            return;
        };

        let target = self.store_target(&key);
        let started = self
            .coalescer
            .start(key.clone(), move || write_through(Some(target), producer));

        let Some(pending) = started else {
            tracing::debug!(key = %key, "refresh already in flight");
            return;
        };

        tokio::spawn(async move {
            let _permit = permit;
            match pending.wait().await {
                Ok(_) => tracing::info!(key = %key, "background refresh completed"),
                Err(error) => tracing::warn!(
                    key = %key,
                    error = %error,
                    "background refresh failed, keeping stale entry"
                ),
            }
        });
    }

    fn store_target(&self, key: &CacheKey) -> StoreTarget<V> {
        (
            self.store.clone(),
            key.clone(),
            self.policies.for_category(key.category()),
        )
    }

    async fn await_shared(&self, pending: PendingFetch<Arc<V>>) -> Result<Arc<V>, FetchError> {
        let Some(limit) = self.fetch_timeout else {
            return pending.wait().await;
        };

        let key = pending.key().to_string();
        match tokio::time::timeout(limit, pending.wait()).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(key = %key, timeout_ms = duration_ms(limit), "fetch wait timed out");
                Err(FetchError::Timeout {
                    key,
                    timeout_ms: duration_ms(limit),
                })
            }
        }
    }

    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.store.invalidate(key).await
    }

    pub async fn invalidate_identifier(&self, identifier: &str) -> usize {
        self.store.invalidate_identifier(identifier).await
    }

    pub async fn invalidate_all(&self) -> usize {
        self.store.clear().await
    }

    pub async fn stats(&self) -> CacheStats {
        let store = self.store.stats().await;
        let served = store.hits + store.stale_hits;
        let lookups = served + store.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            served as f64 / lookups as f64
        };

        CacheStats {
            entry_count: store.entry_count,
            max_entries: store.max_entries,
            hits: store.hits,
            stale_hits: store.stale_hits,
            misses: store.misses,
            hit_rate,
            background_task_count: self.background.active(),
            in_flight: self.coalescer.in_flight() + self.detached.in_flight(),
            per_category: store.per_category,
        }
    }

    /// Stops scheduling refreshes and waits for running ones.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let drained = self.background.drain(timeout).await;
        if !drained {
            tracing::warn!(
                remaining = self.background.active(),
                "background refreshes still running at shutdown"
            );
        }
        drained
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn key() -> CacheKey {
        CacheKey::new(Category::Quote, "TCS")
    }

    fn orchestrator() -> CacheOrchestrator<u32> {
        CacheOrchestrator::new(&CacheSettings::default())
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = orchestrator();
        let result = cache
            .get_or_fetch(key(), || async {
                Err(FetchError::Producer {
                    key: String::from("quote:TCS"),
                    message: String::from("down"),
                })
            })
            .await;
        assert!(result.is_err());
        assert!(cache.store().is_empty().await);

        let value = cache
            .get_or_fetch(key(), || async { Ok(9) })
            .await
            .expect("second attempt");
        assert_eq!(*value, 9);
    }

    #[tokio::test]
    async fn refresh_mode_skips_read_and_stores() {
        let cache = orchestrator();
        cache.get_or_fetch(key(), || async { Ok(1) }).await.expect("seed");

        let value = cache
            .get_or_fetch_with(key(), CacheMode::Refresh, || async { Ok(2) })
            .await
            .expect("refresh");
        assert_eq!(*value, 2);

        let cached = cache.get_or_fetch(key(), || async { Ok(3) }).await.expect("hit");
        assert_eq!(*cached, 2);
    }

    #[tokio::test]
    async fn bypass_mode_leaves_cache_untouched() {
        let cache = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            cache
                .get_or_fetch_with(key(), CacheMode::Bypass, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(5)
                })
                .await
                .expect("bypass");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.store().is_empty().await);
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn miss_does_not_join_a_bypass_fetch_and_stores_its_own_value() {
        let cache = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));

        let bypass = {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_fetch_with(key(), CacheMode::Bypass, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        settle().await;

        let miss_calls = Arc::clone(&calls);
        let value = cache
            .get_or_fetch(key(), move || async move {
                miss_calls.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .await
            .expect("miss");
        assert_eq!(*value, 2);
        assert_eq!(cache.store().len().await, 1);

        let cached = cache.get_or_fetch(key(), || async { Ok(3) }).await.expect("hit");
        assert_eq!(*cached, 2);

        let bypassed = bypass.await.expect("join").expect("bypass");
        assert_eq!(*bypassed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn bypass_joins_an_in_flight_storing_fetch() {
        let cache = orchestrator();
        let calls = Arc::new(AtomicUsize::new(0));

        let miss = {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                cache
                    .get_or_fetch(key(), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok(7)
                    })
                    .await
            })
        };
        settle().await;

        let value = cache
            .get_or_fetch_with(key(), CacheMode::Bypass, || async { Ok(9) })
            .await
            .expect("bypass");

        assert_eq!(*value, 7);
        assert_eq!(*miss.await.expect("join").expect("miss"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.store().len().await, 1);
    }

    #[tokio::test]
    async fn stats_report_hit_rate() {
        let cache = orchestrator();
        cache.get_or_fetch(key(), || async { Ok(1) }).await.expect("miss");
        cache.get_or_fetch(key(), || async { Ok(1) }).await.expect("hit");

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.max_entries, 10_000);
    }
}
