use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::error::TaskError;
use crate::task::TaskId;

/// Policy object invoked for an unhandled failure that reaches a scope
/// boundary without being retrieved via `.await`.
///
/// Invocations never suspend. Cancellation is never routed here.
pub trait ExceptionHandler: Send + Sync {
    fn handle(&self, task: TaskId, error: &TaskError);
}

impl<F> ExceptionHandler for F
where
    F: Fn(TaskId, &TaskError) + Send + Sync,
{
    fn handle(&self, task: TaskId, error: &TaskError) {
        self(task, error)
    }
}

/// Association from scope root identity to its installed handler,
/// consulted at failure-propagation time.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<TaskId, Arc<dyn ExceptionHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, root: TaskId, handler: Arc<dyn ExceptionHandler>) {
        self.lock().insert(root, handler);
    }

    pub fn uninstall(&self, root: TaskId) {
        self.lock().remove(&root);
    }

    /// Offer a failure to the handler installed for `root`. Returns
    /// whether one was installed. A panicking handler is logged and
    /// dropped, never re-entered.
    pub fn dispatch(&self, root: TaskId, task: TaskId, error: &TaskError) -> bool {
        let handler = self.lock().get(&root).cloned();
        match handler {
            Some(handler) => {
                if catch_unwind(AssertUnwindSafe(|| handler.handle(task, error))).is_err() {
                    tracing::warn!(%task, "exception handler panicked; failure dropped");
                }
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, Arc<dyn ExceptionHandler>>> {
        self.handlers.lock().expect("handler registry lock poisoned")
    }
}
