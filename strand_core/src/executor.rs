use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::ArcWake;
use tokio::runtime;
use tokio::sync::oneshot;

/// Minimal executor trait that can spawn futures.
pub trait Executor: Send + Sync + 'static {
    fn spawn(&self, fut: BoxFuture<'static, ()>);
}

/// Executor backed by the ambient Tokio runtime.
pub struct TokioExecutor;

impl Executor for TokioExecutor {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        tokio::spawn(fut);
    }
}

/// Executor that owns a private Tokio runtime parked on a background
/// thread. Backs the Fixed-N and Main/single-thread dispatcher
/// variants so their worker count is independent of the ambient
/// runtime.
pub struct DedicatedExecutor {
    handle: runtime::Handle,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl DedicatedExecutor {
    /// Fixed pool with `workers` threads (clamped to at least one).
    pub fn multi_thread(name: &str, workers: usize) -> Self {
        let rt = runtime::Builder::new_multi_thread()
            .worker_threads(workers.max(1))
            .thread_name(name)
            .enable_all()
            .build()
            .expect("failed to build dispatcher runtime");
        Self::park(name, rt)
    }

    /// Exactly one worker thread; dispatched work starts in submission
    /// order and interleaves only at suspension points.
    pub fn current_thread(name: &str) -> Self {
        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build dispatcher runtime");
        Self::park(name, rt)
    }

    fn park(name: &str, rt: runtime::Runtime) -> Self {
        let handle = rt.handle().clone();
        let (tx, rx) = oneshot::channel::<()>();
        let thread_name = format!("strand-{name}");
        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                tracing::debug!(thread = %thread_name, "dispatcher runtime started");
                // Keeps the runtime alive (timers included) until the
                // executor is dropped; the runtime is then dropped on
                // its own thread, outside any async context.
                rt.block_on(async {
                    let _ = rx.await;
                });
                tracing::debug!(thread = %thread_name, "dispatcher runtime stopped");
            })
            .expect("failed to spawn dispatcher thread");
        Self {
            handle,
            shutdown: Mutex::new(Some(tx)),
        }
    }
}

impl Executor for DedicatedExecutor {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        self.handle.spawn(fut);
    }
}

impl Drop for DedicatedExecutor {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.shutdown.lock() {
            if let Some(tx) = slot.take() {
                let _ = tx.send(());
            }
        }
    }
}

/// Executor with no queue and no thread of its own: the first step of
/// the future runs inline on the calling thread, and every later step
/// runs on whichever thread performs the wake.
pub struct UnconfinedExecutor;

impl Executor for UnconfinedExecutor {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        Resume::start(fut);
    }
}

struct Resume {
    slot: Mutex<Option<BoxFuture<'static, ()>>>,
    woken: AtomicBool,
}

impl Resume {
    fn start(fut: BoxFuture<'static, ()>) {
        let resume = Arc::new(Resume {
            slot: Mutex::new(Some(fut)),
            woken: AtomicBool::new(false),
        });
        Self::advance(&resume);
    }

    fn advance(me: &Arc<Self>) {
        loop {
            // Only one thread holds the future at a time; a wake that
            // finds the slot empty flags the active poller instead.
            let taken = me.slot.lock().expect("resume slot poisoned").take();
            let Some(mut fut) = taken else {
                me.woken.store(true, Ordering::SeqCst);
                return;
            };
            me.woken.store(false, Ordering::SeqCst);
            let waker = futures::task::waker(Arc::clone(me));
            let mut cx = Context::from_waker(&waker);
            match fut.as_mut().poll(&mut cx) {
                Poll::Ready(()) => return,
                Poll::Pending => {
                    *me.slot.lock().expect("resume slot poisoned") = Some(fut);
                    if !me.woken.swap(false, Ordering::SeqCst) {
                        return;
                    }
                }
            }
        }
    }
}

impl ArcWake for Resume {
    fn wake_by_ref(me: &Arc<Self>) {
        Resume::advance(me);
    }
}
