//! Fixed-size worker pool over an unbounded FIFO queue.
//!
//! Workers are OS threads sharing one `mpsc` receiver. A pool is created
//! once, can run any number of batches, and is shut down once (explicitly
//! or on drop). Batches report one [`TaskOutcome`] per task; failures and
//! panics are never swallowed.

use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::ForestError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Result of one task in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<T> {
    /// The task ran and returned a value.
    Completed(T),
    /// The task returned an error or panicked.
    Failed {
        /// Error message or panic payload.
        reason: String,
    },
    /// The task never ran: the batch was cancelled or the pool was shut down.
    Cancelled,
}

impl<T> TaskOutcome<T> {
    /// Return the value of a completed task.
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            TaskOutcome::Failed { .. } | TaskOutcome::Cancelled => None,
        }
    }
}

/// Shared flag that stops not-yet-started tasks of a batch.
///
/// Tasks already running are not interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every task that observes this token from now on.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A fixed set of worker threads consuming tasks in FIFO order.
///
/// Do not call [`run_batch`](Self::run_batch) or [`shutdown`](Self::shutdown)
/// from inside a task running on the same pool; the caller would wait on
/// itself.
pub struct WorkerPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    n_workers: usize,
}

impl WorkerPool {
    /// Spawn a pool with `n_workers` threads.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::InvalidWorkerCount`] | `n_workers` is zero |
    /// | [`ForestError::WorkerSpawn`] | the OS refused to start a thread |
    pub fn new(n_workers: usize) -> Result<Self, ForestError> {
        if n_workers == 0 {
            return Err(ForestError::InvalidWorkerCount { n_workers });
        }

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(n_workers);
        for worker in 0..n_workers {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("sylva-worker-{worker}"))
                .spawn(move || work(worker, &receiver))
                .map_err(|source| ForestError::WorkerSpawn { worker, source })?;
            workers.push(handle);
        }
        debug!(n_workers, "worker pool started");

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            n_workers,
        })
    }

    /// Spawn a pool sized to the host's available parallelism.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::WorkerSpawn`] if a thread cannot be started.
    pub fn with_available_parallelism() -> Result<Self, ForestError> {
        Self::new(available_parallelism())
    }

    /// Return the number of worker threads.
    #[must_use]
    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Append a task to the queue.
    ///
    /// Never blocks. Returns `false` and drops the task when shutdown has
    /// already begun.
    pub fn enqueue<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.send(Box::new(task)).is_ok(),
            None => {
                debug!("task dropped: pool is shut down");
                false
            }
        }
    }

    /// Run `tasks` on the pool and wait for all of them.
    ///
    /// Outcomes are returned in submission order.
    pub fn run_batch<T, E, F>(&self, tasks: Vec<F>) -> Vec<TaskOutcome<T>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display,
    {
        self.run_batch_with_cancel(tasks, &CancelToken::new())
    }

    /// Run `tasks` on the pool, skipping those that start after `cancel`
    /// is cancelled, and wait for all of them.
    ///
    /// Outcomes are returned in submission order.
    pub fn run_batch_with_cancel<T, E, F>(
        &self,
        tasks: Vec<F>,
        cancel: &CancelToken,
    ) -> Vec<TaskOutcome<T>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display,
    {
        let n_tasks = tasks.len();
        let (tx, rx) = mpsc::channel::<(usize, TaskOutcome<T>)>();
        let mut outcomes: Vec<Option<TaskOutcome<T>>> = (0..n_tasks).map(|_| None).collect();

        for (slot, task) in tasks.into_iter().enumerate() {
            let tx = tx.clone();
            let token = cancel.clone();
            let accepted = self.enqueue(move || {
                let outcome = if token.is_cancelled() {
                    TaskOutcome::Cancelled
                } else {
                    match panic::catch_unwind(AssertUnwindSafe(task)) {
                        Ok(Ok(value)) => TaskOutcome::Completed(value),
                        Ok(Err(err)) => TaskOutcome::Failed {
                            reason: err.to_string(),
                        },
                        Err(payload) => TaskOutcome::Failed {
                            reason: panic_message(payload.as_ref()),
                        },
                    }
                };
                // Fails only if the batch caller unwound before draining.
                let _ = tx.send((slot, outcome));
            });
            if !accepted {
                outcomes[slot] = Some(TaskOutcome::Cancelled);
            }
        }
        drop(tx);

        // Ends once every queued task has reported or been dropped.
        for (slot, outcome) in rx {
            outcomes[slot] = Some(outcome);
        }

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| TaskOutcome::Failed {
                    reason: "task was dropped before reporting".to_string(),
                })
            })
            .collect()
    }

    /// Close the queue and wait until every worker has drained it and exited.
    ///
    /// Idempotent. Tasks enqueued afterwards are dropped.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in workers {
            if handle.join().is_err() {
                warn!("worker thread terminated abnormally");
            }
        }
        debug!(n_workers = self.n_workers, "worker pool shut down");
    }

    /// Return `true` once [`shutdown`](Self::shutdown) has begun.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("n_workers", &self.n_workers)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Host parallelism, falling back to a single worker.
pub(crate) fn available_parallelism() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn work(worker: usize, receiver: &Mutex<Receiver<Job>>) {
    loop {
        let job = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        match job {
            Ok(job) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    warn!(worker, reason = %panic_message(payload.as_ref()), "task panicked");
                }
            }
            Err(_) => break,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex, mpsc};
    use std::thread;

    use super::{CancelToken, TaskOutcome, WorkerPool};
    use crate::ForestError;

    type BoxedTask = Box<dyn FnOnce() -> Result<usize, String> + Send>;

    fn task(f: impl FnOnce() -> Result<usize, String> + Send + 'static) -> BoxedTask {
        Box::new(f)
    }

    #[test]
    fn zero_workers_rejected() {
        let err = WorkerPool::new(0).unwrap_err();
        assert!(matches!(err, ForestError::InvalidWorkerCount { n_workers: 0 }));
    }

    #[test]
    fn single_worker_runs_in_fifo_order() {
        let pool = WorkerPool::new(1).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let seen = Arc::clone(&seen);
            assert!(pool.enqueue(move || seen.lock().unwrap().push(i)));
        }
        pool.shutdown();
        assert_eq!(*seen.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn shutdown_drains_queue() {
        let pool = WorkerPool::new(3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = Arc::clone(&counter);
            pool.enqueue(move || {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            });
        }
        pool.shutdown();
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 100);
    }

    #[test]
    fn enqueue_after_shutdown_is_dropped() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        assert!(pool.is_shut_down());
        assert!(!pool.enqueue(|| {}));
        // Second shutdown is a no-op.
        pool.shutdown();
    }

    #[test]
    fn batch_outcomes_in_submission_order() {
        let pool = WorkerPool::new(4).unwrap();
        let tasks: Vec<BoxedTask> = (0..16usize)
            .map(|i| task(move || Ok(i * i)))
            .collect();
        let outcomes = pool.run_batch(tasks);
        let values: Vec<usize> = outcomes.into_iter().filter_map(TaskOutcome::completed).collect();
        assert_eq!(values, (0..16usize).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn pool_is_reusable_across_batches() {
        let pool = WorkerPool::new(2).unwrap();
        for round in 0..3usize {
            let tasks: Vec<BoxedTask> = (0..5usize)
                .map(|i| task(move || Ok(round * 10 + i)))
                .collect();
            let outcomes = pool.run_batch(tasks);
            assert_eq!(outcomes.len(), 5);
            assert_eq!(outcomes[4], TaskOutcome::Completed(round * 10 + 4));
        }
    }

    #[test]
    fn errors_and_panics_become_failures() {
        let pool = WorkerPool::new(2).unwrap();
        let tasks: Vec<BoxedTask> = vec![
            task(|| Ok(1)),
            task(|| Err("bad input".to_string())),
            task(|| panic!("boom")),
            task(|| Ok(4)),
        ];
        let outcomes = pool.run_batch(tasks);
        assert_eq!(outcomes[0], TaskOutcome::Completed(1));
        assert_eq!(
            outcomes[1],
            TaskOutcome::Failed {
                reason: "bad input".to_string()
            }
        );
        assert_eq!(
            outcomes[2],
            TaskOutcome::Failed {
                reason: "boom".to_string()
            }
        );
        assert_eq!(outcomes[3], TaskOutcome::Completed(4));

        // Workers survive the panic.
        let again = vec![task(|| Ok(5))];
        assert_eq!(pool.run_batch(again), vec![TaskOutcome::Completed(5)]);
    }

    #[test]
    fn cancelled_token_skips_pending_tasks() {
        let pool = WorkerPool::new(1).unwrap();
        let token = CancelToken::new();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                started_rx.recv().unwrap();
                token.cancel();
                release_tx.send(()).unwrap();
            })
        };

        let mut tasks = vec![task(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            Ok(0)
        })];
        tasks.extend((1..4usize).map(|i| task(move || Ok(i))));

        let outcomes = pool.run_batch_with_cancel(tasks, &token);
        canceller.join().unwrap();

        assert_eq!(outcomes[0], TaskOutcome::Completed(0));
        assert!(outcomes[1..].iter().all(|o| *o == TaskOutcome::Cancelled));
    }

    #[test]
    fn batch_after_shutdown_is_cancelled() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        let tasks = vec![task(|| Ok(1))];
        assert_eq!(pool.run_batch(tasks), vec![TaskOutcome::Cancelled]);
    }

    #[test]
    fn empty_batch_returns_immediately() {
        let pool = WorkerPool::new(1).unwrap();
        let outcomes = pool.run_batch(Vec::<BoxedTask>::new());
        assert!(outcomes.is_empty());
    }
}
