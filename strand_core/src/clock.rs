//! Monotonic timer facade over Tokio's timer wheel.
//!
//! `delay` is the canonical suspension point: it is where a running
//! task observes its cancellation flag. Under `tokio::time::pause` the
//! clock is virtual, which the timing tests rely on.

use std::time::Duration;

use tokio::time::{self, Instant};

use crate::error::{TaskError, TaskResult};
use crate::scope::try_current_task;

/// Current instant on the monotonic clock.
pub fn now() -> Instant {
    Instant::now()
}

/// Suspend the current task for at least `duration`.
///
/// Races the timer against the current task's cancellation token and
/// unwinds with `TaskError::Cancelled` if cancellation wins. Outside
/// any task this degrades to a plain sleep.
pub async fn delay(duration: Duration) -> TaskResult<()> {
    match try_current_task() {
        Some(task) => {
            let token = task.token().clone();
            tokio::select! {
                _ = token.cancelled() => Err(TaskError::Cancelled),
                _ = time::sleep(duration) => Ok(()),
            }
        }
        None => {
            time::sleep(duration).await;
            Ok(())
        }
    }
}

/// Suspend the current task until `deadline`, observing cancellation.
pub async fn delay_until(deadline: Instant) -> TaskResult<()> {
    match try_current_task() {
        Some(task) => {
            let token = task.token().clone();
            tokio::select! {
                _ = token.cancelled() => Err(TaskError::Cancelled),
                _ = time::sleep_until(deadline) => Ok(()),
            }
        }
        None => {
            time::sleep_until(deadline).await;
            Ok(())
        }
    }
}
