use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the task was created, which decides how its failure is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Scope root; never runs a body of its own.
    Root,
    /// Fire-and-forget child; failures go to the exception handler.
    Launch,
    /// Result-bearing child; failures are stored for `.await`.
    Async,
}

/// Task lifecycle states. Transitions are monotonic: there is no way
/// out of `Completed`, `Cancelled` or `Failed`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New = 0,
    Active = 1,
    Completing = 2,
    Cancelling = 3,
    Completed = 4,
    Cancelled = 5,
    Failed = 6,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled | TaskState::Failed)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::New,
            1 => TaskState::Active,
            2 => TaskState::Completing,
            3 => TaskState::Cancelling,
            4 => TaskState::Completed,
            5 => TaskState::Cancelled,
            _ => TaskState::Failed,
        }
    }
}

struct TaskInner {
    id: TaskId,
    kind: TaskKind,
    state: AtomicU8,
    cancel: CancellationToken,
    // Weak: the parent tracks children for cancellation fan-out but
    // never owns their memory.
    parent: Weak<TaskInner>,
    children: Mutex<Vec<TaskHandle>>,
    failure: Mutex<Option<TaskError>>,
    done: Notify,
}

/// Handle to a task in the cancellation tree. Cloneable; all clones
/// observe the same state.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskInner>,
}

impl TaskHandle {
    /// Fresh root task, born `Active`. Roots have no body; a scope
    /// settles them during `close`.
    pub fn new_root() -> Self {
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                kind: TaskKind::Root,
                state: AtomicU8::new(TaskState::Active as u8),
                cancel: CancellationToken::new(),
                parent: Weak::new(),
                children: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
                done: Notify::new(),
            }),
        }
    }

    /// Create and register a child of this task. A child born under a
    /// task that is already cancelling is flagged immediately and will
    /// settle `Cancelled` without running its body.
    pub fn new_child(&self, kind: TaskKind) -> Self {
        let child = Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                kind,
                state: AtomicU8::new(TaskState::New as u8),
                cancel: CancellationToken::new(),
                parent: Arc::downgrade(&self.inner),
                children: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
                done: Notify::new(),
            }),
        };
        self.lock_children().push(child.clone());
        if self.inner.cancel.is_cancelled() || self.state() == TaskState::Cancelling {
            child.cancel();
        }
        child
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn kind(&self) -> TaskKind {
        self.inner.kind
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.inner.state.load(Ordering::SeqCst))
    }

    /// Cooperative cancellation flag, observed at suspension points.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub fn parent(&self) -> Option<TaskHandle> {
        self.inner.parent.upgrade().map(|inner| TaskHandle { inner })
    }

    /// Snapshot of the currently registered children.
    pub fn children(&self) -> Vec<TaskHandle> {
        self.lock_children().clone()
    }

    /// The stored failure, if this task failed or was failed by a child.
    pub fn failure(&self) -> Option<TaskError> {
        self.inner
            .failure
            .lock()
            .expect("task failure slot poisoned")
            .clone()
    }

    /// Request cancellation. Depth-first: every currently owned child
    /// is cancelled before this task transitions, so no child outlives
    /// the cancellation of its parent. Cooperative only: a body that
    /// never reaches another suspension point keeps running.
    pub fn cancel(&self) {
        // Trip the token before snapshotting the children. A child
        // registered after the snapshot then sees the token in
        // `new_child`'s check and flags itself; one registered before
        // it is covered by the recursion below. Either way no child
        // slips through unflagged.
        self.inner.cancel.cancel();
        for child in self.children() {
            child.cancel();
        }
        let flagged = self.try_transition(TaskState::New, TaskState::Cancelling)
            || self.try_transition(TaskState::Active, TaskState::Cancelling);
        if flagged {
            tracing::trace!(task = %self.inner.id, "cancellation requested");
        }
    }

    /// Suspend until this task reaches any terminal state. Never fails
    /// on `Cancelled` or `Failed`; retrieve the outcome separately.
    pub async fn join(&self) {
        loop {
            let notified = self.inner.done.notified();
            if self.state().is_terminal() {
                return;
            }
            notified.await;
        }
    }

    /// First dispatch: `New -> Active`. Returns false when the task
    /// was cancelled before it ever ran, settling it `Cancelled`.
    pub(crate) fn begin(&self) -> bool {
        if self.try_transition(TaskState::New, TaskState::Active) {
            return true;
        }
        if self.state() == TaskState::Cancelling {
            self.finalize(TaskState::Cancelled, Some(TaskError::Cancelled));
        }
        false
    }

    /// Body finished; children may still be running.
    pub(crate) fn start_completing(&self) {
        self.try_transition(TaskState::Active, TaskState::Completing);
    }

    /// Suspend until every registered child has settled. Children
    /// deregister themselves on settlement, so this drains the list.
    pub(crate) async fn await_children(&self) {
        loop {
            let next = self.lock_children().first().cloned();
            match next {
                Some(child) => child.join().await,
                None => return,
            }
        }
    }

    /// Settle this task from its body's outcome. `None` means the body
    /// returned a value. Once a task is `Cancelling`, cancellation wins
    /// over whatever the body produced.
    pub(crate) fn finish(&self, outcome: Option<TaskError>) -> TaskState {
        let cancelling = self.state() == TaskState::Cancelling;
        match outcome {
            Some(TaskError::Cancelled) => {
                self.finalize(TaskState::Cancelled, Some(TaskError::Cancelled));
                TaskState::Cancelled
            }
            Some(err) if cancelling => {
                self.finalize(TaskState::Cancelled, Some(err));
                TaskState::Cancelled
            }
            Some(err) => {
                self.finalize(TaskState::Failed, Some(err));
                TaskState::Failed
            }
            None if cancelling => {
                self.finalize(TaskState::Cancelled, Some(TaskError::Cancelled));
                TaskState::Cancelled
            }
            None => {
                self.finalize(TaskState::Completed, None);
                TaskState::Completed
            }
        }
    }

    /// Record a failure on this task without settling it. Used by the
    /// scope root to remember the first child failure; the slot is
    /// written at most once.
    pub(crate) fn record_failure(&self, err: TaskError) {
        let mut slot = self
            .inner
            .failure
            .lock()
            .expect("task failure slot poisoned");
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    /// Settle a root task once all of its children have drained.
    pub(crate) fn finalize_root(&self) {
        let terminal = match self.failure() {
            Some(err) if !err.is_cancellation() => TaskState::Failed,
            _ => TaskState::Cancelled,
        };
        self.finalize(terminal, None);
    }

    fn finalize(&self, terminal: TaskState, failure: Option<TaskError>) {
        debug_assert!(terminal.is_terminal());
        if let Some(err) = failure {
            self.record_failure(err);
        }
        // Compare-and-set: a cancelling ancestor on another dispatcher
        // thread may race this task's own completion.
        loop {
            let current = self.state();
            if current.is_terminal() {
                return;
            }
            if self
                .inner
                .state
                .compare_exchange(
                    current as u8,
                    terminal as u8,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                break;
            }
        }
        tracing::trace!(task = %self.inner.id, state = ?terminal, "task settled");
        self.inner.done.notify_waiters();
        if let Some(parent) = self.parent() {
            parent.remove_child(self.inner.id);
        }
    }

    fn remove_child(&self, id: TaskId) {
        self.lock_children().retain(|child| child.id() != id);
    }

    fn try_transition(&self, from: TaskState, to: TaskState) -> bool {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn lock_children(&self) -> std::sync::MutexGuard<'_, Vec<TaskHandle>> {
        self.inner.children.lock().expect("task tree lock poisoned")
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_moves_new_to_active() {
        let root = TaskHandle::new_root();
        let task = root.new_child(TaskKind::Launch);
        assert_eq!(task.state(), TaskState::New);
        assert!(task.begin());
        assert_eq!(task.state(), TaskState::Active);
    }

    #[test]
    fn cancel_before_dispatch_settles_cancelled() {
        let root = TaskHandle::new_root();
        let task = root.new_child(TaskKind::Launch);
        task.cancel();
        assert!(!task.begin());
        assert_eq!(task.state(), TaskState::Cancelled);
    }

    #[test]
    fn terminal_states_are_sticky() {
        let root = TaskHandle::new_root();
        let task = root.new_child(TaskKind::Launch);
        assert!(task.begin());
        task.finish(None);
        assert_eq!(task.state(), TaskState::Completed);
        task.cancel();
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[test]
    fn child_born_under_cancelling_parent_is_flagged() {
        let root = TaskHandle::new_root();
        root.cancel();
        let child = root.new_child(TaskKind::Launch);
        assert!(child.is_cancelled());
        assert!(!child.begin());
        assert_eq!(child.state(), TaskState::Cancelled);
    }

    #[test]
    fn a_child_registered_during_cancel_is_always_flagged() {
        use std::sync::Barrier;

        // Races new_child against cancel on the same parent. In every
        // interleaving the child must end up flagged: either the
        // cancel recursion saw it in the child list, or new_child saw
        // the already-tripped token.
        for _ in 0..1000 {
            let root = TaskHandle::new_root();
            let parent = root.new_child(TaskKind::Launch);
            let barrier = Arc::new(Barrier::new(2));

            let canceller = {
                let parent = parent.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    parent.cancel();
                })
            };
            let registrar = {
                let parent = parent.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    parent.new_child(TaskKind::Launch)
                })
            };

            canceller.join().expect("canceller thread");
            let child = registrar.join().expect("registrar thread");

            assert!(child.is_cancelled());
            assert!(!child.begin());
            assert_eq!(child.state(), TaskState::Cancelled);
        }
    }

    #[test]
    fn settled_children_are_pruned_from_the_parent() {
        let root = TaskHandle::new_root();
        let task = root.new_child(TaskKind::Launch);
        assert_eq!(root.children().len(), 1);
        assert!(task.begin());
        task.finish(None);
        assert!(root.children().is_empty());
    }
}
