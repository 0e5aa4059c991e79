//! Single-flight execution keyed by [`CacheKey`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::key::CacheKey;
use crate::FetchError;

type Outcome<V> = Option<Result<V, FetchError>>;

#[derive(Debug)]
struct Slot<V> {
    id: u64,
    receiver: watch::Receiver<Outcome<V>>,
}

type Registry<V> = Arc<Mutex<HashMap<CacheKey, Slot<V>>>>;

fn lock<V>(
    registry: &Mutex<HashMap<CacheKey, Slot<V>>>,
) -> MutexGuard<'_, HashMap<CacheKey, Slot<V>>> {
    // Entries are plain data; a panic while holding the lock leaves them consistent.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the registry slot when the shared execution ends, including by panic.
struct SlotGuard<V> {
    registry: Registry<V>,
    key: CacheKey,
    id: u64,
}

impl<V> Drop for SlotGuard<V> {
    fn drop(&mut self) {
        let mut registry = lock(&self.registry);
        if registry.get(&self.key).is_some_and(|slot| slot.id == self.id) {
            registry.remove(&self.key);
        }
    }
}

/// Handle on an in-flight shared execution.
///
/// Dropping the handle does not cancel the execution.
#[derive(Debug)]
pub struct PendingFetch<V> {
    key: CacheKey,
    receiver: watch::Receiver<Outcome<V>>,
}

impl<V: Clone> PendingFetch<V> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Waits for the shared outcome.
    pub async fn wait(mut self) -> Result<V, FetchError> {
        let aborted = || FetchError::Aborted {
            key: self.key.to_string(),
        };

        match self.receiver.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone().unwrap_or_else(|| Err(aborted())),
            Err(_) => Err(aborted()),
        }
    }
}

/// Deduplicates concurrent fetches sharing a key.
///
/// The first caller for a key installs a registry slot and spawns the
/// producer; callers arriving while it runs subscribe to the same outcome.
/// The slot is removed once the producer finishes, so the next wave of
/// callers triggers a fresh execution.
#[derive(Debug)]
pub struct RequestCoalescer<V> {
    registry: Registry<V>,
    next_id: Arc<AtomicU64>,
}

impl<V> Clone for RequestCoalescer<V> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<V> Default for RequestCoalescer<V> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<V> RequestCoalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `producer` at most once across concurrent callers for `key`.
    pub async fn execute<F, Fut>(&self, key: CacheKey, producer: F) -> Result<V, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        self.join_or_start(key, producer).0.wait().await
    }

    /// Spawns `producer` only if nothing is in flight for `key`.
    ///
    /// Returns `None` when an execution was already running.
    pub fn start<F, Fut>(&self, key: CacheKey, producer: F) -> Option<PendingFetch<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        match self.join_or_start(key, producer) {
            (pending, true) => Some(pending),
            (_, false) => None,
        }
    }

    /// Subscribes to the in-flight execution for `key`, spawning `producer` if none exists.
    ///
    /// The flag reports whether this call started the execution.
    pub fn join_or_start<F, Fut>(&self, key: CacheKey, producer: F) -> (PendingFetch<V>, bool)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let (sender, id) = {
            let mut registry = lock(&self.registry);
            if let Some(slot) = registry.get(&key) {
                let pending = PendingFetch {
                    key,
                    receiver: slot.receiver.clone(),
                };
                return (pending, false);
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let (sender, receiver) = watch::channel(None);
            registry.insert(
                key.clone(),
                Slot {
                    id,
                    receiver: receiver.clone(),
                },
            );
            (sender, id)
        };

        let receiver = sender.subscribe();
        let guard = SlotGuard {
            registry: Arc::clone(&self.registry),
            key: key.clone(),
            id,
        };

        tokio::spawn(async move {
            let outcome = producer().await;
            drop(guard);
            // Waiters may all have gone away.
            let _ = sender.send(Some(outcome));
        });

        (PendingFetch { key, receiver }, true)
    }

    /// Subscribes to the in-flight execution for `key` without starting one.
    pub fn join(&self, key: &CacheKey) -> Option<PendingFetch<V>> {
        lock(&self.registry).get(key).map(|slot| PendingFetch {
            key: key.clone(),
            receiver: slot.receiver.clone(),
        })
    }

    /// Number of executions currently in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.registry).len()
    }

    pub fn is_pending(&self, key: &CacheKey) -> bool {
        lock(&self.registry).contains_key(key)
    }
}
