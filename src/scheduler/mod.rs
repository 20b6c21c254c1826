//! Deferred work for the next turn.
//!
//! The store defers disposal of a replaced reactive record so that watcher
//! callbacks already in flight keep a usable record until they finish.

use parking_lot::Mutex;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks on a later turn of the host's event loop.
pub trait Scheduler: Send + Sync {
    fn defer(&self, task: Task);

    /// Called by the store at the start of each operation. Schedulers that
    /// keep their own backlog run the tasks deferred on earlier turns here.
    fn tick(&self) {}
}

/// Defers onto the current tokio runtime.
///
/// The spawned task yields once before running, so it never runs within the
/// turn that scheduled it. Outside a tokio runtime the task is kept in a
/// backlog and runs on the next [`Scheduler::tick`], i.e. when the store
/// starts its next operation.
#[derive(Default)]
pub struct TokioScheduler {
    backlog: Mutex<Vec<Task>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting for the next tick.
    pub fn backlog(&self) -> usize {
        self.backlog.lock().len()
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::task::yield_now().await;
                    task();
                });
            }
            Err(_) => {
                tracing::trace!("no tokio runtime, deferring task to the next tick");
                self.backlog.lock().push(task);
            }
        }
    }

    fn tick(&self) {
        let tasks = std::mem::take(&mut *self.backlog.lock());
        for task in tasks {
            task();
        }
    }
}

/// Queues tasks until [`ManualScheduler::run_pending`] is called.
///
/// Useful in tests and in hosts that drive their own event loop.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<Vec<Task>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run everything queued so far. Returns how many tasks ran.
    pub fn run_pending(&self) -> usize {
        let tasks = std::mem::take(&mut *self.queue.lock());
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        self.queue.lock().push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn manual_scheduler_waits_for_run_pending() {
        let scheduler = ManualScheduler::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        scheduler.defer(Box::new(move || ran_clone.store(true, Ordering::SeqCst)));
        assert_eq!(scheduler.pending(), 1);
        assert!(!ran.load(Ordering::SeqCst));

        assert_eq!(scheduler.run_pending(), 1);
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn tokio_scheduler_waits_for_the_next_tick_without_runtime() {
        let scheduler = TokioScheduler::new();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();

        scheduler.defer(Box::new(move || ran_clone.store(true, Ordering::SeqCst)));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(scheduler.backlog(), 1);

        scheduler.tick();
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(scheduler.backlog(), 0);
    }

    #[tokio::test]
    async fn tokio_scheduler_defers_to_a_later_turn() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        TokioScheduler::new().defer(Box::new(move || ran_clone.store(true, Ordering::SeqCst)));
        assert!(!ran.load(Ordering::SeqCst));

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(ran.load(Ordering::SeqCst));
    }
}
