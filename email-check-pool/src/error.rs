//! Task failure reasons

use std::time::Duration;

use thiserror::Error;

/// Why a pooled task did not produce a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// The work future resolved to an error.
    #[error("{0}")]
    Failed(String),

    /// The task ran for at least the pool timeout and was aborted.
    #[error("Async task exceeded timeout of {} seconds.", .0.as_secs())]
    TimedOut(Duration),

    /// The worker ended without reporting a value (panic or cancellation).
    #[error("Async task returned an empty result.")]
    EmptyResult,
}

impl TaskFailure {
    /// Whether the failure came from the pool rather than from the work itself.
    #[must_use]
    pub fn is_pool_failure(&self) -> bool {
        matches!(self, Self::TimedOut(_) | Self::EmptyResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_uses_whole_seconds() {
        let failure = TaskFailure::TimedOut(Duration::from_millis(3_500));
        assert_eq!(
            failure.to_string(),
            "Async task exceeded timeout of 3 seconds."
        );
    }

    #[test]
    fn test_failed_message_passthrough() {
        let failure = TaskFailure::Failed("boom".to_string());
        assert_eq!(failure.to_string(), "boom");
        assert!(!failure.is_pool_failure());
        assert!(TaskFailure::EmptyResult.is_pool_failure());
    }
}
