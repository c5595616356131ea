//! Bounded-time wrapper racing a body against the monotonic clock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use strand_core::{get_current_scope, Dispatchers, Scope, TaskError, TaskResult};

/// Run `fut` as a cancellable child task with a deadline.
///
/// On expiry the child is asked to cancel; cancellation stays
/// cooperative, so the timeout failure is raised only once the body
/// observes the flag at a suspension point and unwinds. A body that
/// settles successfully before observing the flag keeps its result.
///
/// Outside any task an implicit standalone root is used, so the body
/// still gets a cancellation flag to observe.
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> TaskResult<T>
where
    F: Future<Output = TaskResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let scope = match get_current_scope() {
        Some(scope) => scope,
        None => Arc::new(Scope::new(Dispatchers::default())),
    };
    let (task, body) = scope.scoped(fut);
    tokio::pin!(body);
    let timer = time::sleep(duration);
    tokio::pin!(timer);
    tokio::select! {
        outcome = &mut body => outcome,
        _ = &mut timer => {
            tracing::trace!(task = %task.id(), ?duration, "timeout expired; cancelling body");
            task.cancel();
            match body.await {
                Err(TaskError::Cancelled) => Err(TaskError::TimedOut(duration)),
                outcome => outcome,
            }
        }
    }
}
