//! TTL-aware in-memory store with bounded capacity.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::key::{CacheKey, CachePolicy, Category};

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Read-time freshness of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Immutable snapshot handed out by [`CacheStore::get`].
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: Arc<V>,
    pub stored_at: Instant,
    pub age: Duration,
    pub policy: CachePolicy,
    pub freshness: Freshness,
}

impl<V> CacheEntry<V> {
    pub const fn is_fresh(&self) -> bool {
        matches!(self.freshness, Freshness::Fresh)
    }
}

#[derive(Debug)]
struct StoredEntry<V> {
    value: Arc<V>,
    stored_at: Instant,
    policy: CachePolicy,
}

impl<V> StoredEntry<V> {
    fn freshness(&self, now: Instant) -> Option<(Duration, Freshness)> {
        let age = now.saturating_duration_since(self.stored_at);
        if age <= self.policy.ttl {
            Some((age, Freshness::Fresh))
        } else if age <= self.policy.max_age {
            Some((age, Freshness::Stale))
        } else {
            None
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.freshness(now).is_none()
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.stale_hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Per-category counters and entry count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub entries: usize,
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
}

/// Point-in-time store counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entry_count: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub per_category: BTreeMap<Category, CategoryStats>,
}

#[derive(Debug)]
struct StoreInner<V> {
    map: HashMap<CacheKey, StoredEntry<V>>,
    max_entries: usize,
}

impl<V> StoreInner<V> {
    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| !entry.is_expired(now));
        before - self.map.len()
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let oldest = self
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.stored_at)
            .map(|(key, _)| key.clone())?;
        self.map.remove(&oldest);
        Some(oldest)
    }

    fn retain_keys(&mut self, keep: impl Fn(&CacheKey) -> bool) -> usize {
        let before = self.map.len();
        self.map.retain(|key, _| keep(key));
        before - self.map.len()
    }
}

/// Thread-safe cache of immutable records.
///
/// Freshness is evaluated lazily at read time; there is no periodic sweep.
/// Entries past their max age are evicted when read and by the capacity
/// reaper when an insert would overflow.
#[derive(Debug)]
pub struct CacheStore<V> {
    inner: Arc<RwLock<StoreInner<V>>>,
    counters: Arc<[Counters; 3]>,
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl<V> CacheStore<V> {
    /// `max_entries` of zero is bumped to one.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                map: HashMap::new(),
                max_entries: max_entries.max(1),
            })),
            counters: Arc::new(Default::default()),
        }
    }

    /// Looks up `key`, returning a snapshot with its current freshness.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let now = Instant::now();
        let counters = &self.counters[key.category().index()];

        {
            let store = self.inner.read().await;
            match store.map.get(key) {
                None => {
                    counters.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(entry) => {
                    if let Some((age, freshness)) = entry.freshness(now) {
                        let counter = match freshness {
                            Freshness::Fresh => &counters.hits,
                            Freshness::Stale => &counters.stale_hits,
                        };
                        counter.fetch_add(1, Ordering::Relaxed);
                        return Some(CacheEntry {
                            value: Arc::clone(&entry.value),
                            stored_at: entry.stored_at,
                            age,
                            policy: entry.policy,
                            freshness,
                        });
                    }
                }
            }
        }

        // Past max age: treat as absent and evict, unless replaced meanwhile.
        counters.misses.fetch_add(1, Ordering::Relaxed);
        let mut store = self.inner.write().await;
        if store
            .map
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
        {
            store.map.remove(key);
            tracing::debug!(key = %key, "evicted entry past max age");
        }
        None
    }

    /// Stores `value` under `key` with a fresh timestamp, replacing any prior entry.
    pub async fn put(&self, key: CacheKey, value: V, policy: CachePolicy) -> Arc<V> {
        let value = Arc::new(value);
        let now = Instant::now();
        let mut store = self.inner.write().await;

        if !store.map.contains_key(&key) && store.map.len() >= store.max_entries {
            let purged = store.purge_expired(now);
            if purged == 0 {
                if let Some(evicted) = store.evict_oldest() {
                    tracing::debug!(key = %evicted, "evicted oldest entry at capacity");
                }
            } else {
                tracing::debug!(purged, "purged expired entries at capacity");
            }
        }

        store.map.insert(
            key,
            StoredEntry {
                value: Arc::clone(&value),
                stored_at: now,
                policy,
            },
        );
        value
    }

    /// Removes `key`. Returns whether an entry existed.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        let mut store = self.inner.write().await;
        store.map.remove(key).is_some()
    }

    /// Removes every entry whose rendered key starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut store = self.inner.write().await;
        store.retain_keys(|key| !key.to_string().starts_with(prefix))
    }

    /// Removes every entry for `identifier` across all categories and variants.
    pub async fn invalidate_identifier(&self, identifier: &str) -> usize {
        let mut store = self.inner.write().await;
        store.retain_keys(|key| key.identifier() != identifier)
    }

    pub async fn clear(&self) -> usize {
        let mut store = self.inner.write().await;
        let removed = store.map.len();
        store.map.clear();
        removed
    }

    pub async fn purge_expired(&self) -> usize {
        let mut store = self.inner.write().await;
        store.purge_expired(Instant::now())
    }

    /// Number of stored entries, including ones past max age not yet evicted.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn max_entries(&self) -> usize {
        self.inner.read().await.max_entries
    }

    pub async fn stats(&self) -> StoreStats {
        let store = self.inner.read().await;

        let mut per_category = BTreeMap::new();
        let (mut hits, mut stale_hits, mut misses) = (0, 0, 0);
        for category in Category::ALL {
            let (h, s, m) = self.counters[category.index()].snapshot();
            hits += h;
            stale_hits += s;
            misses += m;
            let entries = store
                .map
                .keys()
                .filter(|key| key.category() == category)
                .count();
            per_category.insert(
                category,
                CategoryStats {
                    entries,
                    hits: h,
                    stale_hits: s,
                    misses: m,
                },
            );
        }

        StoreStats {
            entry_count: store.map.len(),
            max_entries: store.max_entries,
            hits,
            stale_hits,
            misses,
            per_category,
        }
    }
}
