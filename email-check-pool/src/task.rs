//! Queued task and its continuations

use std::fmt;

use futures::future::BoxFuture;

use crate::error::TaskFailure;

/// Sequential identifier assigned by the pool, starting at 1.
pub type TaskId = u64;

/// Lifecycle of a pooled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Waiting for a free slot.
    Queued,
    /// Spawned and not yet collected.
    Running,
    /// Produced a value.
    Succeeded,
    /// Returned an error or ended without a value.
    Failed,
    /// Aborted after exceeding the pool timeout.
    TimedOut,
}

impl TaskState {
    /// Whether the task can no longer change state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::TimedOut)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

pub(crate) type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
pub(crate) type FailureFn = Box<dyn FnOnce(TaskFailure) + Send>;

/// A unit of work registered with a [`Pool`](crate::Pool).
///
/// Continuations are attached by chaining on the `&mut Task` returned from
/// [`Pool::add`](crate::Pool::add).
pub struct Task<T> {
    id: TaskId,
    pub(crate) work: Option<BoxFuture<'static, Result<T, String>>>,
    pub(crate) on_success: Option<SuccessFn<T>>,
    pub(crate) on_failure: Option<FailureFn>,
}

impl<T> Task<T> {
    pub(crate) fn new(id: TaskId, work: BoxFuture<'static, Result<T, String>>) -> Self {
        Self {
            id,
            work: Some(work),
            on_success: None,
            on_failure: None,
        }
    }

    /// Identifier of this task within its pool.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Run `callback` with the value when the task succeeds.
    pub fn on_success<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Run `callback` with the failure reason when the task fails or times out.
    pub fn on_failure<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnOnce(TaskFailure) + Send + 'static,
    {
        self.on_failure = Some(Box::new(callback));
        self
    }

    /// Hand the value to the success continuation, if any.
    pub(crate) fn trigger_success(success: Option<SuccessFn<T>>, id: TaskId, value: T) {
        match success {
            Some(callback) => callback(value),
            None => log::debug!("Task {id} succeeded without a success continuation"),
        }
    }

    /// Hand the failure to the failure continuation, or log it when none is set.
    pub(crate) fn trigger_failure(failure_fn: Option<FailureFn>, id: TaskId, failure: TaskFailure) {
        match failure_fn {
            Some(callback) => callback(failure),
            None => log::warn!("Task {id} failed with no failure handler: {failure}"),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("has_on_success", &self.on_success.is_some())
            .field("has_on_failure", &self.on_failure.is_some())
            .finish_non_exhaustive()
    }
}
