//! Detached task tracking
//!
//! Spawned tasks are never joined individually; the group only counts them
//! so shutdown can wait until all of them are gone.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    idle: Notify,
}

/// Decrements on drop so a panicking task is still accounted for
struct ActiveGuard(Arc<Inner>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.0.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// A drainable set of detached tasks
#[derive(Clone, Debug, Default)]
pub struct TaskGroup {
    inner: Arc<Inner>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn without waiting. Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.active.fetch_add(1, Ordering::AcqRel);
        let guard = ActiveGuard(self.inner.clone());
        tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });
    }

    /// Tasks still running
    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Wait until no task is running, including tasks spawned while waiting
    pub async fn drain(&self) {
        loop {
            let idle = self.inner.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.active() == 0 {
                return;
            }
            idle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_waits_for_nested_tasks() {
        let group = TaskGroup::new();
        let done = Arc::new(AtomicU32::new(0));

        for _ in 0..4 {
            let nested = group.clone();
            let done = done.clone();
            group.spawn(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let done_inner = done.clone();
                nested.spawn(async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    done_inner.fetch_add(1, Ordering::SeqCst);
                });
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        group.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 8);
        assert_eq!(group.active(), 0);
    }

    #[tokio::test]
    async fn test_drain_empty_group() {
        TaskGroup::new().drain().await;
    }

    #[tokio::test]
    async fn test_panicking_task_released() {
        let group = TaskGroup::new();
        group.spawn(async { panic!("task failure") });

        group.drain().await;
        assert_eq!(group.active(), 0);
    }
}
