use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project::pin_project;
use tokio::sync::oneshot;
use tokio_util::sync::WaitForCancellationFutureOwned;

use crate::error::{TaskError, TaskResult};
use crate::scope::try_current_task;
use crate::task::TaskHandle;

/// A task that additionally carries a computed result or failure.
///
/// `Deferred` implements [`Future`], so awaiting it is the retrieval
/// operation: it suspends until the underlying task settles, then
/// yields the stored value, re-raises the stored failure, or raises
/// `TaskError::Cancelled`. The result slot is written at most once.
///
/// Awaiting is itself a suspension point: the poll also observes the
/// *awaiting* task's own cancellation flag.
#[pin_project]
pub struct Deferred<T> {
    handle: TaskHandle,
    #[pin]
    rx: oneshot::Receiver<TaskResult<T>>,
    #[pin]
    caller_cancel: Option<WaitForCancellationFutureOwned>,
    armed: bool,
}

impl<T> Deferred<T> {
    pub(crate) fn new(handle: TaskHandle, rx: oneshot::Receiver<TaskResult<T>>) -> Self {
        Self {
            handle,
            rx,
            caller_cancel: None,
            armed: false,
        }
    }

    /// The underlying task, for cancel/join/state inspection.
    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    /// Request cooperative cancellation of the underlying task.
    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

impl<T> Future for Deferred<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        if !*this.armed {
            *this.armed = true;
            if let Some(caller) = try_current_task() {
                this.caller_cancel
                    .set(Some(caller.token().clone().cancelled_owned()));
            }
        }
        if let Some(cancel) = this.caller_cancel.as_mut().as_pin_mut() {
            if cancel.poll(cx).is_ready() {
                return Poll::Ready(Err(TaskError::Cancelled));
            }
        }
        match this.rx.poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Sender dropped without a value: the task was torn down
            // before delivery.
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
