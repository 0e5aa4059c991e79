//! In-memory caching with stale-while-revalidate and request coalescing.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`CacheStore`] | TTL-aware bounded map of immutable records |
//! | [`RequestCoalescer`] | One producer execution per key at a time |
//! | [`CacheOrchestrator`] | Fresh / stale / miss policy over both |
//! | [`BackgroundTasks`] | Bounded set of detached refresh tasks |

mod coalescer;
mod key;
mod orchestrator;
mod store;
mod tasks;

use std::time::Duration;

pub use coalescer::{PendingFetch, RequestCoalescer};
pub use key::{CacheKey, CachePolicies, CachePolicy, Category};
pub use orchestrator::{CacheMode, CacheOrchestrator, CacheStats};
pub use store::{CacheEntry, CacheStore, CategoryStats, Freshness, StoreStats, DEFAULT_MAX_ENTRIES};
pub use tasks::{BackgroundTasks, TaskPermit, DEFAULT_MAX_BACKGROUND_TASKS};

use crate::ConfigError;

/// Cache sizing and timing knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub policies: CachePolicies,
    pub max_entries: usize,
    pub max_background_tasks: usize,
    /// Upper bound on how long a caller waits for a shared fetch.
    pub fetch_timeout: Option<Duration>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            policies: CachePolicies::default(),
            max_entries: DEFAULT_MAX_ENTRIES,
            max_background_tasks: DEFAULT_MAX_BACKGROUND_TASKS,
            fetch_timeout: None,
        }
    }
}

impl CacheSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entries == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.policies.validate()
    }
}
