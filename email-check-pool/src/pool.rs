//! Pool scheduler

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use crate::error::TaskFailure;
use crate::task::{FailureFn, SuccessFn, Task, TaskId, TaskState};

const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A spawned task waiting to be collected.
struct RunningTask<T> {
    receiver: oneshot::Receiver<Result<T, String>>,
    handle: JoinHandle<()>,
    started_at: Instant,
    on_success: Option<SuccessFn<T>>,
    on_failure: Option<FailureFn>,
}

/// Final state of every task that went through [`Pool::wait`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Terminal state per task id, ascending.
    pub states: BTreeMap<TaskId, TaskState>,
}

impl PoolReport {
    fn count(&self, state: TaskState) -> usize {
        self.states.values().filter(|s| **s == state).count()
    }

    /// Number of tasks that produced a value.
    pub fn succeeded(&self) -> usize {
        self.count(TaskState::Succeeded)
    }

    /// Number of tasks that returned an error or no value.
    pub fn failed(&self) -> usize {
        self.count(TaskState::Failed)
    }

    /// Number of tasks aborted on timeout.
    pub fn timed_out(&self) -> usize {
        self.count(TaskState::TimedOut)
    }

    /// Total number of collected tasks.
    pub fn total(&self) -> usize {
        self.states.len()
    }
}

/// Bounded-concurrency scheduler for async work.
///
/// Tasks are admitted in insertion order while fewer than `concurrency` are
/// running. [`wait`](Self::wait) drives the pool until every task reached a
/// terminal state.
pub struct Pool<T> {
    concurrency: usize,
    timeout: Duration,
    poll_interval: Duration,
    next_id: TaskId,
    queue: VecDeque<Task<T>>,
    running: BTreeMap<TaskId, RunningTask<T>>,
}

impl<T: Send + 'static> Pool<T> {
    /// Create a pool with the default limits (10 concurrent, 60s timeout, 50ms poll).
    pub fn create() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            next_id: 0,
            queue: VecDeque::new(),
            running: BTreeMap::new(),
        }
    }

    /// Maximum number of tasks running at once (at least 1).
    #[must_use]
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Per-task wall-clock limit. `Duration::ZERO` disables it.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long the supervisor sleeps between polls (at least 1ms).
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Queue `work` and return the task so continuations can be attached.
    pub fn add<F, E>(&mut self, work: F) -> &mut Task<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Display,
    {
        self.next_id += 1;
        let work = work.map(|outcome| outcome.map_err(|e| e.to_string())).boxed();
        self.queue.push_back(Task::new(self.next_id, work));
        let last = self.queue.len() - 1;
        &mut self.queue[last]
    }

    /// Current state of a task that has not been collected yet.
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        if self.running.contains_key(&id) {
            Some(TaskState::Running)
        } else if self.queue.iter().any(|task| task.id() == id) {
            Some(TaskState::Queued)
        } else {
            None
        }
    }

    /// Number of tasks not yet started.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Run every queued task to completion and report their final states.
    pub async fn wait(&mut self) -> PoolReport {
        let mut report = PoolReport::default();
        while !self.queue.is_empty() || !self.running.is_empty() {
            self.start_pending();
            self.collect_finished(&mut report);
            if !self.running.is_empty() {
                sleep(self.poll_interval).await;
            }
        }
        log::debug!(
            "Pool drained: {} succeeded, {} failed, {} timed out",
            report.succeeded(),
            report.failed(),
            report.timed_out()
        );
        report
    }

    fn start_pending(&mut self) {
        while self.running.len() < self.concurrency {
            let Some(mut task) = self.queue.pop_front() else {
                break;
            };
            let Some(work) = task.work.take() else {
                continue;
            };
            let (sender, receiver) = oneshot::channel();
            let handle = tokio::spawn(async move {
                let outcome = work.await;
                // The supervisor may already have given up on this task.
                let _ = sender.send(outcome);
            });
            self.running.insert(
                task.id(),
                RunningTask {
                    receiver,
                    handle,
                    started_at: Instant::now(),
                    on_success: task.on_success.take(),
                    on_failure: task.on_failure.take(),
                },
            );
        }
    }

    fn collect_finished(&mut self, report: &mut PoolReport) {
        let ids: Vec<TaskId> = self.running.keys().copied().collect();
        for id in ids {
            let Some(entry) = self.running.get_mut(&id) else {
                continue;
            };
            let outcome = match entry.receiver.try_recv() {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(message)) => Err(TaskFailure::Failed(message)),
                Err(TryRecvError::Closed) => Err(TaskFailure::EmptyResult),
                Err(TryRecvError::Empty) => {
                    if self.timeout.is_zero() || entry.started_at.elapsed() < self.timeout {
                        continue;
                    }
                    entry.handle.abort();
                    Err(TaskFailure::TimedOut(self.timeout))
                }
            };
            let Some(entry) = self.running.remove(&id) else {
                continue;
            };
            match outcome {
                Ok(value) => {
                    report.states.insert(id, TaskState::Succeeded);
                    Task::trigger_success(entry.on_success, id, value);
                }
                Err(failure) => {
                    let state = if matches!(failure, TaskFailure::TimedOut(_)) {
                        TaskState::TimedOut
                    } else {
                        TaskState::Failed
                    };
                    report.states.insert(id, state);
                    Task::<T>::trigger_failure(entry.on_failure, id, failure);
                }
            }
        }
    }
}

impl<T: Send + 'static> Default for Pool<T> {
    fn default() -> Self {
        Self::create()
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        for entry in self.running.values() {
            entry.handle.abort();
        }
    }
}
