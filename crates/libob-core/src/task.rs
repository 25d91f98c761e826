//! Tracking and cancellation of background work.
//!
//! Every task spawned through a [`TaskManager`] is registered before it
//! starts and deregistered when it finishes, however it finishes: normal
//! completion, panic or cancellation. A finished task is never left behind
//! in the live set.

use std::collections::HashMap;
use std::panic;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Default)]
struct TaskSet {
    live: Mutex<HashMap<u64, CancellationToken>>,
    next_id: AtomicU64,
    idle: Notify,
}

/// Removes a task from the live set when dropped.
struct LiveGuard {
    set: Arc<TaskSet>,
    id: u64,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let now_idle = {
            let mut live = self.set.live.lock();
            live.remove(&self.id);
            live.is_empty()
        };
        trace!(task_id = self.id, "Task finished");
        if now_idle {
            self.set.idle.notify_waiters();
        }
    }
}

/// Owns an unbounded set of in-flight tasks.
///
/// Cloning is cheap; clones share the same live set.
#[derive(Clone, Default)]
pub struct TaskManager {
    set: Arc<TaskSet>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `work` as a tracked task and waits for it.
    ///
    /// Resolves to `cancelled` if [`cancel_all`](Self::cancel_all) hits the
    /// task first. A panic inside `work` is resumed in the caller.
    pub async fn spawn<F, T>(&self, work: F, cancelled: T) -> T
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match self.spawn_tracked(work).await {
            Ok(Some(value)) => value,
            Ok(None) => cancelled,
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(_) => cancelled,
        }
    }

    /// Runs `work` as a tracked task without waiting for it.
    pub fn spawn_detached<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.spawn_tracked(work));
    }

    fn spawn_tracked<F, T>(&self, work: F) -> JoinHandle<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = self.set.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        self.set.live.lock().insert(id, token.clone());
        let guard = LiveGuard {
            set: self.set.clone(),
            id,
        };
        trace!(task_id = id, "Task spawned");

        tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                () = token.cancelled() => None,
                value = work => Some(value),
            }
        })
    }

    /// Requests cancellation of every task currently tracked.
    ///
    /// Returns immediately; tasks spawned afterwards are unaffected.
    pub fn cancel_all(&self) {
        let tokens: Vec<_> = self.set.live.lock().values().cloned().collect();
        debug!(count = tokens.len(), "Cancelling all tasks");
        for token in tokens {
            token.cancel();
        }
    }

    /// Number of tasks in the live set.
    pub fn len(&self) -> usize {
        self.set.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until the live set is empty.
    pub async fn drain(&self) {
        loop {
            let notified = self.set.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_empty() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("live", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[tokio::test]
    async fn spawn_returns_result_and_deregisters() {
        let tasks = TaskManager::new();
        let value = tasks.spawn(async { 7 }, 0).await;
        assert_eq!(value, 7);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn cancelled_spawn_returns_fallback() {
        let tasks = TaskManager::new();
        let waiter = {
            let tasks = tasks.clone();
            tokio::spawn(async move {
                tasks
                    .spawn(futures::future::pending::<&str>(), "cancelled")
                    .await
            })
        };

        while tasks.is_empty() {
            tokio::task::yield_now().await;
        }
        tasks.cancel_all();

        assert_eq!(waiter.await.unwrap(), "cancelled");
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    #[should_panic(expected = "worker failed")]
    async fn spawn_resumes_panics() {
        let tasks = TaskManager::new();
        tasks
            .spawn(async { panic!("worker failed") }, ())
            .await;
    }

    #[tokio::test]
    async fn panicking_detached_task_is_deregistered() {
        let tasks = TaskManager::new();
        tasks.spawn_detached(async { panic!("detached failure") });
        tokio::time::timeout(Duration::from_secs(5), tasks.drain())
            .await
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[test]
    fn drain_is_ready_when_idle() {
        let tasks = TaskManager::new();
        let mut drain = tokio_test::task::spawn(tasks.drain());
        tokio_test::assert_ready!(drain.poll());
    }

    #[tokio::test]
    async fn cancel_all_spares_later_tasks() {
        let tasks = TaskManager::new();
        tasks.spawn_detached(futures::future::pending());
        tasks.cancel_all();
        tokio::time::timeout(Duration::from_secs(5), tasks.drain())
            .await
            .unwrap();

        let value = tasks.spawn(async { "ran" }, "cancelled").await;
        assert_eq!(value, "ran");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_all_empties_live_set_under_interleavings() {
        for round in 0..20u64 {
            let mut rng = StdRng::seed_from_u64(round);
            let tasks = TaskManager::new();
            let completed = Arc::new(AtomicUsize::new(0));
            let count = rng.gen_range(10..60);
            let cancel_at = rng.gen_range(0..count);

            for i in 0..count {
                let delay = Duration::from_micros(rng.gen_range(0..2_000));
                let completed = completed.clone();
                let forever = rng.gen_bool(0.5);
                tasks.spawn_detached(async move {
                    tokio::time::sleep(delay).await;
                    if forever {
                        futures::future::pending::<()>().await;
                    }
                    completed.fetch_add(1, Ordering::SeqCst);
                });
                if i == cancel_at {
                    tasks.cancel_all();
                }
                if rng.gen_bool(0.5) {
                    tokio::task::yield_now().await;
                }
            }
            tasks.cancel_all();

            tokio::time::timeout(Duration::from_secs(5), tasks.drain())
                .await
                .unwrap_or_else(|_| panic!("round {round} did not drain"));
            assert!(tasks.is_empty(), "round {round} left live tasks");
            assert!(completed.load(Ordering::SeqCst) <= count);
        }
    }
}
