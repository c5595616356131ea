//! Multi-await composition over deferreds and task handles.

use strand_core::{Deferred, TaskHandle, TaskResult};

/// Await a fixed collection of deferreds, suspending until all
/// settle. Results come back in input order. On failure the first
/// failing deferred **by input order** is re-raised, which keeps the
/// outcome deterministic regardless of completion order.
///
/// All outcomes are gathered before one is re-raised: a failure fans
/// out cancellation to its siblings, and re-raising the root failure
/// beats re-raising a sibling's secondary cancellation. A bare
/// cancellation is only returned when no deferred genuinely failed.
///
/// The bodies were already started by `async_task`, so awaiting them
/// one by one here does not serialize the underlying work.
pub async fn await_all<T>(deferreds: Vec<Deferred<T>>) -> TaskResult<Vec<T>>
where
    T: Send + 'static,
{
    let mut outcomes = Vec::with_capacity(deferreds.len());
    for deferred in deferreds {
        outcomes.push(deferred.await);
    }
    if let Some(err) = outcomes.iter().find_map(|outcome| match outcome {
        Err(err) if !err.is_cancellation() => Some(err.clone()),
        _ => None,
    }) {
        return Err(err);
    }
    outcomes.into_iter().collect()
}

/// Suspend until every handle in the set reaches a terminal state.
/// Like `TaskHandle::join`, never fails on `Cancelled` or `Failed`.
pub async fn join_all(tasks: &[TaskHandle]) {
    for task in tasks {
        task.join().await;
    }
}
