//! Process-wide scheduler for delayed callbacks.
//!
//! One scheduler instance serves every menu timeout and game timer in the
//! process. The clock is a fixed-period tick loop; each tick fires every
//! task whose due time has elapsed, in due-time order with FIFO tie-breaks.

use crate::error::GameResult;
use crate::types::TaskId;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// The work a timed task performs when it fires. Failures are logged and
/// never stop other tasks from firing.
pub type TaskCallback = Box<dyn FnOnce() -> BoxFuture<'static, GameResult<()>> + Send>;

/// A callback scheduled to fire once at an absolute due time.
pub struct TimedTask {
    pub id: TaskId,
    pub label: String,
    pub due: Instant,
    seq: u64,
    callback: TaskCallback,
}

#[derive(Default)]
struct SchedulerInner {
    tasks: Vec<TimedTask>,
    next_seq: u64,
}

#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
    /// Tasks fired later than this past their due time are logged as late.
    /// Late tasks still fire; lateness is a fidelity property, not a
    /// correctness one.
    lateness_threshold: Duration,
}

impl TaskScheduler {
    pub fn new(lateness_threshold: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner::default())),
            lateness_threshold,
        }
    }

    /// Schedule a callback to fire `delay` from now.
    pub async fn schedule_in(&self, delay: Duration, label: &str, callback: TaskCallback) -> TaskId {
        self.schedule_at(Instant::now() + delay, label, callback).await
    }

    /// Schedule a callback to fire at an absolute due time.
    pub async fn schedule_at(&self, due: Instant, label: &str, callback: TaskCallback) -> TaskId {
        let id = ulid::Ulid::new().to_string();
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.push(TimedTask {
            id: id.clone(),
            label: label.to_string(),
            due,
            seq,
            callback,
        });
        id
    }

    /// Cancel a pending task. Cancelling a task that already fired (or was
    /// never scheduled) is a no-op and returns false.
    pub async fn cancel(&self, task_id: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != task_id);
        inner.tasks.len() != before
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.tasks.len()
    }

    /// Fire every task whose due time has elapsed, in due-time order with
    /// FIFO tie-breaks. Returns the number of tasks fired. A failing or
    /// panicking callback is reported and does not stop the rest.
    pub async fn run_pending(&self) -> usize {
        let now = Instant::now();
        let mut due: Vec<TimedTask> = {
            let mut inner = self.inner.lock().await;
            let (due, rest) = inner.tasks.drain(..).partition(|t| t.due <= now);
            inner.tasks = rest;
            due
        };
        due.sort_by_key(|t| (t.due, t.seq));

        let fired = due.len();
        for task in due {
            let lateness = now.duration_since(task.due);
            if lateness > self.lateness_threshold {
                tracing::warn!(
                    "Task '{}' fired {:?} late (threshold {:?})",
                    task.label,
                    lateness,
                    self.lateness_threshold
                );
            }

            // Run in a spawned task so a panicking callback cannot take the
            // ticker down with it.
            match tokio::spawn((task.callback)()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("Task '{}' failed: {}", task.label, e);
                }
                Err(join_err) => {
                    tracing::error!("Task '{}' panicked: {}", task.label, join_err);
                }
            }
        }
        fired
    }

    /// Spawn the background tick loop driving this scheduler.
    pub fn spawn_ticker(&self, period: Duration) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                scheduler.run_pending().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GameError;
    use std::sync::Mutex as StdMutex;

    fn recording_callback(log: &Arc<StdMutex<Vec<u32>>>, value: u32) -> TaskCallback {
        let log = Arc::clone(log);
        Box::new(move || {
            Box::pin(async move {
                log.lock().unwrap().push(value);
                Ok(())
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_in_due_order_with_fifo_ties() {
        let scheduler = TaskScheduler::new(Duration::from_secs(10));
        let log = Arc::new(StdMutex::new(Vec::new()));

        let base = Instant::now();
        scheduler
            .schedule_at(base + Duration::from_secs(5), "later", recording_callback(&log, 3))
            .await;
        scheduler
            .schedule_at(base + Duration::from_secs(1), "tie-a", recording_callback(&log, 1))
            .await;
        scheduler
            .schedule_at(base + Duration::from_secs(1), "tie-b", recording_callback(&log, 2))
            .await;

        tokio::time::sleep(Duration::from_secs(6)).await;
        let fired = scheduler.run_pending().await;

        assert_eq!(fired, 3);
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(scheduler.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_due_tasks_stay_pending() {
        let scheduler = TaskScheduler::new(Duration::from_secs(10));
        let log = Arc::new(StdMutex::new(Vec::new()));

        scheduler
            .schedule_in(Duration::from_secs(60), "future", recording_callback(&log, 1))
            .await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.run_pending().await, 0);
        assert_eq!(scheduler.pending_count().await, 1);

        // Late firing still eventually happens, never skipped
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(scheduler.run_pending().await, 1);
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let scheduler = TaskScheduler::new(Duration::from_secs(10));
        let log = Arc::new(StdMutex::new(Vec::new()));

        let id = scheduler
            .schedule_in(Duration::from_secs(5), "doomed", recording_callback(&log, 1))
            .await;

        assert!(scheduler.cancel(&id).await);
        assert!(!scheduler.cancel(&id).await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(scheduler.run_pending().await, 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_callback_does_not_stop_others() {
        let scheduler = TaskScheduler::new(Duration::from_secs(10));
        let log = Arc::new(StdMutex::new(Vec::new()));

        let base = Instant::now();
        scheduler
            .schedule_at(
                base + Duration::from_secs(1),
                "bad",
                Box::new(|| {
                    Box::pin(async {
                        Err(GameError::InternalConsistency("boom".to_string()))
                    })
                }),
            )
            .await;
        scheduler
            .schedule_at(base + Duration::from_secs(2), "good", recording_callback(&log, 7))
            .await;

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(scheduler.run_pending().await, 2);
        assert_eq!(*log.lock().unwrap(), vec![7]);
    }
}
