use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

pub const DEFAULT_MAX_BACKGROUND_TASKS: usize = 256;

#[derive(Debug)]
struct TasksInner {
    active: watch::Sender<usize>,
    limit: usize,
    closed: AtomicBool,
}

/// Bounded counter over detached background tasks.
#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    inner: Arc<TasksInner>,
}

/// Slot held by one running background task; released on drop.
#[derive(Debug)]
pub struct TaskPermit {
    inner: Arc<TasksInner>,
}

impl Drop for TaskPermit {
    fn drop(&mut self) {
        self.inner
            .active
            .send_modify(|active| *active = active.saturating_sub(1));
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BACKGROUND_TASKS)
    }
}

impl BackgroundTasks {
    pub fn new(limit: usize) -> Self {
        let (active, _) = watch::channel(0);
        Self {
            inner: Arc::new(TasksInner {
                active,
                limit,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Reserves a slot, or `None` when the set is full or closed.
    pub fn try_acquire(&self) -> Option<TaskPermit> {
        if self.inner.closed.load(Ordering::Acquire) {
            return None;
        }

        let limit = self.inner.limit;
        let acquired = self.inner.active.send_if_modified(|active| {
            if *active < limit {
                *active += 1;
                true
            } else {
                false
            }
        });

        acquired.then(|| TaskPermit {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn active(&self) -> usize {
        *self.inner.active.borrow()
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Stops accepting new tasks and waits for running ones.
    ///
    /// Returns `false` if tasks were still running when `timeout` elapsed.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.inner.closed.store(true, Ordering::Release);
        let mut active = self.inner.active.subscribe();
        tokio::time::timeout(timeout, active.wait_for(|count| *count == 0))
            .await
            .is_ok_and(|result| result.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_permits_beyond_limit() {
        let tasks = BackgroundTasks::new(2);
        let first = tasks.try_acquire().expect("first");
        let _second = tasks.try_acquire().expect("second");
        assert!(tasks.try_acquire().is_none());

        drop(first);
        assert_eq!(tasks.active(), 1);
        assert!(tasks.try_acquire().is_some());
    }

    #[tokio::test]
    async fn drain_waits_for_running_tasks_and_closes() {
        let tasks = BackgroundTasks::new(4);
        let permit = tasks.try_acquire().expect("permit");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(permit);
        });

        assert!(tasks.drain(Duration::from_secs(1)).await);
        assert!(tasks.try_acquire().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_after_timeout() {
        let tasks = BackgroundTasks::new(4);
        let _permit = tasks.try_acquire().expect("permit");
        assert!(!tasks.drain(Duration::from_millis(50)).await);
    }
}
