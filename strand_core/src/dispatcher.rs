use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::executor::{DedicatedExecutor, Executor, TokioExecutor, UnconfinedExecutor};

/// Identifies the run policy of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherKind {
    /// CPU-bound pool sized by the runtime.
    Default,
    /// Pool sized for blocking-ish operations.
    Io,
    /// Exactly one thread, submission-order execution.
    Main,
    /// No queue; runs inline on the caller, resumes on the waker's thread.
    Unconfined,
    /// Caller-specified worker count.
    Fixed(usize),
}

/// Dispatcher encapsulates an executor plus its identity. Immutable
/// after creation; cloning shares the underlying executor.
#[derive(Clone)]
pub struct Dispatcher {
    kind: DispatcherKind,
    inner: Arc<dyn Executor>,
}

impl Dispatcher {
    pub fn new(kind: DispatcherKind, inner: Arc<dyn Executor>) -> Self {
        Self { kind, inner }
    }

    pub fn kind(&self) -> DispatcherKind {
        self.kind
    }

    /// Enqueue work according to this dispatcher's run policy. Never
    /// blocks and never fails; failures surface through the task that
    /// was running when they happened.
    pub fn dispatch(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.inner.spawn(Box::pin(fut));
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("kind", &self.kind).finish()
    }
}

/// Registry of common dispatchers. These are plain constructors: each
/// call hands out an explicit value to pass at launch sites, never a
/// process-global singleton.
pub struct Dispatchers;

impl Dispatchers {
    /// Default dispatcher for CPU-bound work (ambient Tokio pool).
    pub fn default() -> Dispatcher {
        Dispatcher::new(DispatcherKind::Default, Arc::new(TokioExecutor))
    }

    /// IO dispatcher. Shares the ambient runtime, whose blocking pool
    /// is already sized for IO-heavy workloads.
    pub fn io() -> Dispatcher {
        Dispatcher::new(DispatcherKind::Io, Arc::new(TokioExecutor))
    }

    /// Main-confined dispatcher: one dedicated thread, work starts in
    /// submission order and interleaves only at suspension points.
    pub fn main() -> Dispatcher {
        Dispatcher::new(
            DispatcherKind::Main,
            Arc::new(DedicatedExecutor::current_thread("main")),
        )
    }

    /// Unconfined dispatcher: first step inline on the caller's
    /// thread, later steps on whichever thread resumes the task.
    pub fn unconfined() -> Dispatcher {
        Dispatcher::new(DispatcherKind::Unconfined, Arc::new(UnconfinedExecutor))
    }

    /// Fixed pool with `workers` threads (clamped to at least one).
    pub fn fixed(workers: usize) -> Dispatcher {
        let workers = workers.max(1);
        Dispatcher::new(
            DispatcherKind::Fixed(workers),
            Arc::new(DedicatedExecutor::multi_thread("fixed", workers)),
        )
    }

    /// Single-thread dispatcher, the one-worker case of [`Dispatchers::fixed`].
    pub fn single_thread() -> Dispatcher {
        Dispatcher::new(
            DispatcherKind::Fixed(1),
            Arc::new(DedicatedExecutor::current_thread("single")),
        )
    }
}
