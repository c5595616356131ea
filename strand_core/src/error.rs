use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Result type used by task bodies and suspension points.
pub type TaskResult<T> = Result<T, TaskError>;

/// Error taxonomy for task termination.
///
/// `Cancelled` is cooperative teardown, not a bug; it unwinds through
/// `?` at suspension points and is never offered to an exception
/// handler. `TimedOut` is a failure subtype raised by the bounded-time
/// wrapper and propagates like any other failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TaskError {
    /// The task observed its cancellation flag at a suspension point.
    #[error("task was cancelled")]
    Cancelled,

    /// The task body produced an error value.
    #[error("task failed: {0}")]
    Failed(Arc<dyn Error + Send + Sync>),

    /// The task exceeded a `with_timeout` deadline.
    #[error("task timed out after {0:?}")]
    TimedOut(Duration),
}

impl TaskError {
    /// Wrap an arbitrary error value as a body failure.
    pub fn failure<E>(err: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        TaskError::Failed(Arc::new(err))
    }

    /// Ad-hoc body failure from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        TaskError::Failed(Arc::new(Message(message.into())))
    }

    /// Cancellation must stay distinguishable from genuine failure
    /// everywhere failures are routed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for Message {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg_failure_keeps_payload() {
        let err = TaskError::msg("backend unreachable");
        assert!(!err.is_cancellation());
        assert!(err.to_string().contains("backend unreachable"));
    }

    #[test]
    fn cancellation_is_not_a_failure() {
        assert!(TaskError::Cancelled.is_cancellation());
        assert!(!TaskError::TimedOut(Duration::from_secs(1)).is_cancellation());
    }
}
