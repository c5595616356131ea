use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::deferred::Deferred;
use crate::dispatcher::Dispatcher;
use crate::error::{TaskError, TaskResult};
use crate::handler::{ExceptionHandler, HandlerRegistry};
use crate::task::{TaskHandle, TaskKind, TaskState};

tokio::task_local! {
    /// Ambient context of the currently running task. Installed by the
    /// scope around every task body; never a process-global.
    pub static CURRENT_SCOPE: Arc<Scope>;
}

/// The scope installed for the currently running task, if any.
pub fn get_current_scope() -> Option<Arc<Scope>> {
    CURRENT_SCOPE.try_with(Arc::clone).ok()
}

/// Handle of the currently running task, if any. Suspension points use
/// this to find the cancellation flag to observe.
pub fn try_current_task() -> Option<TaskHandle> {
    CURRENT_SCOPE.try_with(|scope| scope.task.clone()).ok()
}

/// Run `f` against the current scope and await the future it builds.
///
/// # Panics
///
/// Panics when called outside of a running task.
pub async fn with_current_scope<F, Fut>(f: F) -> Fut::Output
where
    F: FnOnce(&Scope) -> Fut,
    Fut: Future,
{
    let scope = get_current_scope().expect("with_current_scope called outside of a scope");
    f(scope.as_ref()).await
}

/// Whether a child's failure fans out to the rest of the scope or is
/// handed straight back to a caller already awaiting the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Propagation {
    /// Unobserved child: cancel the scope tree, offer to the handler.
    Structural,
    /// The caller awaits the outcome inline and handles it there.
    Observed,
}

/// Scope owns a tree of tasks and defines the structured-concurrency
/// boundary: failures fan out to siblings, cancellation fans down to
/// descendants, and `close` guarantees nothing outlives the scope.
///
/// The same type doubles as the per-task ambient context: every child
/// body runs with a `Scope` whose `task` is its own handle.
#[derive(Clone)]
pub struct Scope {
    /// Dispatcher used when a launch site does not name one.
    pub dispatcher: Dispatcher,
    /// The task this context belongs to; the root for a fresh scope.
    pub task: TaskHandle,
    handlers: Arc<HandlerRegistry>,
    root: TaskHandle,
}

impl Scope {
    /// Fresh scope bound to a default dispatcher. Ownership is always
    /// explicit: tasks are created through a scope reference only.
    pub fn new(dispatcher: Dispatcher) -> Self {
        let root = TaskHandle::new_root();
        Self {
            dispatcher,
            task: root.clone(),
            handlers: Arc::new(HandlerRegistry::new()),
            root,
        }
    }

    pub fn root(&self) -> &TaskHandle {
        &self.root
    }

    /// Install the failure policy for this scope. Replaces any handler
    /// installed earlier.
    pub fn install_exception_handler(&self, handler: Arc<dyn ExceptionHandler>) {
        self.handlers.install(self.root.id(), handler);
    }

    /// Launch a fire-and-forget child on the scope's dispatcher.
    pub fn launch<F>(&self, fut: F) -> TaskHandle
    where
        F: Future<Output = TaskResult<()>> + Send + 'static,
    {
        self.launch_on(self.dispatcher.clone(), fut)
    }

    /// Launch a fire-and-forget child on an explicit dispatcher.
    pub fn launch_on<F>(&self, dispatcher: Dispatcher, fut: F) -> TaskHandle
    where
        F: Future<Output = TaskResult<()>> + Send + 'static,
    {
        let (ctx, task) = self.child_context(dispatcher.clone(), TaskKind::Launch);
        tracing::trace!(task = %task.id(), dispatcher = ?dispatcher.kind(), "launch");
        let drive = Self::drive(ctx, task.clone(), fut, Propagation::Structural);
        dispatcher.dispatch(async move {
            // Failure routing already happened inside drive.
            let _ = drive.await;
        });
        task
    }

    /// Start a result-bearing child on the scope's dispatcher. Returns
    /// immediately; the body runs per the dispatcher's policy.
    pub fn async_task<T, F>(&self, fut: F) -> Deferred<T>
    where
        F: Future<Output = TaskResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.async_task_on(self.dispatcher.clone(), fut)
    }

    /// Start a result-bearing child on an explicit dispatcher.
    pub fn async_task_on<T, F>(&self, dispatcher: Dispatcher, fut: F) -> Deferred<T>
    where
        F: Future<Output = TaskResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (ctx, task) = self.child_context(dispatcher.clone(), TaskKind::Async);
        tracing::trace!(task = %task.id(), dispatcher = ?dispatcher.kind(), "async task");
        let (tx, rx) = oneshot::channel();
        let drive = Self::drive(ctx, task.clone(), fut, Propagation::Structural);
        dispatcher.dispatch(async move {
            let outcome = drive.await;
            if tx.send(outcome).is_err() {
                tracing::trace!("deferred result dropped before delivery");
            }
        });
        Deferred::new(task, rx)
    }

    /// Run a body as a child on another dispatcher and await it, like
    /// Kotlin's `withContext`. The caller observes the outcome
    /// directly, so a failure here is re-raised at the call site
    /// instead of fanning out to siblings.
    pub async fn with_dispatcher<T, F>(&self, dispatcher: Dispatcher, fut: F) -> TaskResult<T>
    where
        F: Future<Output = TaskResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (ctx, task) = self.child_context(dispatcher.clone(), TaskKind::Async);
        let (tx, rx) = oneshot::channel();
        let drive = Self::drive(ctx, task, fut, Propagation::Observed);
        dispatcher.dispatch(async move {
            let _ = tx.send(drive.await);
        });
        rx.await.unwrap_or(Err(TaskError::Cancelled))
    }

    /// Drive a body as a child task inline on the current thread (no
    /// dispatch). Building block for bounded-time wrappers: the handle
    /// allows cancelling the child while the returned future is live.
    pub fn scoped<T, F>(&self, fut: F) -> (TaskHandle, impl Future<Output = TaskResult<T>>)
    where
        F: Future<Output = TaskResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (ctx, task) = self.child_context(self.dispatcher.clone(), TaskKind::Async);
        (
            task.clone(),
            Self::drive(ctx, task, fut, Propagation::Observed),
        )
    }

    /// Cancel the root and, depth-first, every descendant. Cooperative:
    /// bodies unwind at their next suspension point.
    pub fn cancel(&self) {
        self.root.cancel();
    }

    /// Cancel everything and suspend until every descendant settles.
    /// No task outlives its scope. Idempotent.
    pub async fn close(&self) {
        self.root.cancel();
        self.root.await_children().await;
        self.root.finalize_root();
        self.handlers.uninstall(self.root.id());
    }

    /// Suspend until all currently launched children settle, without
    /// cancelling anything.
    pub async fn join(&self) {
        self.root.await_children().await;
    }

    fn child_context(&self, dispatcher: Dispatcher, kind: TaskKind) -> (Arc<Scope>, TaskHandle) {
        let task = self.task.new_child(kind);
        let ctx = Arc::new(Scope {
            dispatcher,
            task: task.clone(),
            handlers: Arc::clone(&self.handlers),
            root: self.root.clone(),
        });
        (ctx, task)
    }

    /// Run a child body through the task state machine: begin, execute
    /// under the ambient context, wait for grandchildren, settle, and
    /// route any failure.
    fn drive<T, F>(
        ctx: Arc<Scope>,
        task: TaskHandle,
        fut: F,
        propagation: Propagation,
    ) -> impl Future<Output = TaskResult<T>>
    where
        F: Future<Output = TaskResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        async move {
            if !task.begin() {
                return Err(TaskError::Cancelled);
            }
            let result = CURRENT_SCOPE.scope(Arc::clone(&ctx), fut).await;
            task.start_completing();
            task.await_children().await;
            let terminal = task.finish(result.as_ref().err().cloned());
            if terminal == TaskState::Failed && propagation == Propagation::Structural {
                if let Err(err) = &result {
                    ctx.propagate_failure(&task, err);
                }
            }
            match terminal {
                TaskState::Cancelled => Err(TaskError::Cancelled),
                _ => result,
            }
        }
    }

    /// Strict, fails-fast propagation: a child failure cancels the
    /// whole scope tree before the failure is surfaced. Launch
    /// failures are offered to the installed handler; async failures
    /// stay retrievable at the await site. Cancellation never lands
    /// here.
    fn propagate_failure(&self, failed: &TaskHandle, err: &TaskError) {
        if err.is_cancellation() {
            return;
        }
        tracing::error!(
            task = %failed.id(),
            scope = %self.root.id(),
            error = %err,
            "task failure; cancelling scope"
        );
        self.root.record_failure(err.clone());
        self.root.cancel();
        if failed.kind() == TaskKind::Launch
            && !self.handlers.dispatch(self.root.id(), failed.id(), err)
        {
            tracing::error!(task = %failed.id(), "no exception handler installed; scope terminated");
        }
    }
}
