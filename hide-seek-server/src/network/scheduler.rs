//! Recurring Tasks
//!
//! A background job that runs on a fixed period until it asks to stop or
//! is cancelled. Used for the readiness gate and stale-session cleanup.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// What a tick wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskControl {
    /// Run again next period.
    Continue,
    /// Finish permanently.
    Stop,
}

/// Scheduler errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// A zero period would spin without yielding.
    #[error("task {0} needs a non-zero period")]
    ZeroPeriod(&'static str),
}

/// Handle to a spawned recurring task.
pub struct RecurringTask {
    name: &'static str,
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RecurringTask {
    /// Spawn `tick` to run every `period`, first after one full period.
    ///
    /// A tick always runs to completion; cancellation is observed between
    /// ticks. A zero period is refused before anything is spawned.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Result<Self, SchedulerError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TaskControl> + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulerError::ZeroPeriod(name));
        }

        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if tick().await == TaskControl::Stop {
                            debug!("Task {} stopped itself", name);
                            break;
                        }
                    }
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            debug!("Task {} cancelled", name);
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self { name, cancel_tx, handle })
    }

    /// Task name, for logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the task before its next tick.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Check if the task has finished, by stopping itself or by cancellation.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to finish.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_task_stops_itself() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let task = RecurringTask::spawn("countdown", Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= 3 { TaskControl::Stop } else { TaskControl::Continue }
            }
        })
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), task.join())
            .await
            .expect("task should stop");
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_prevents_further_ticks() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let task = RecurringTask::spawn("forever", Duration::from_secs(3600), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TaskControl::Continue
            }
        })
        .unwrap();
        assert_eq!(task.name(), "forever");

        task.cancel();
        tokio::time::timeout(Duration::from_secs(5), task.join())
            .await
            .expect("task should finish after cancel");
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_is_finished() {
        let task = RecurringTask::spawn("once", Duration::from_millis(1), || async { TaskControl::Stop })
            .unwrap();
        for _ in 0..500 {
            if task.is_finished() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(task.is_finished());
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        let result = RecurringTask::spawn("spin", Duration::ZERO, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                TaskControl::Continue
            }
        });

        assert_eq!(result.err(), Some(SchedulerError::ZeroPeriod("spin")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
