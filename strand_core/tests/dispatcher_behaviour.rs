use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use strand_core::{Dispatchers, Scope, TaskState};
use tokio::sync::oneshot;

#[tokio::test]
async fn unconfined_runs_the_first_step_inline() {
    let scope = Scope::new(Dispatchers::unconfined());
    let flag = Arc::new(AtomicBool::new(false));
    let flag_clone = Arc::clone(&flag);

    let job = scope.launch(async move {
        flag_clone.store(true, Ordering::SeqCst);
        Ok(())
    });

    // No suspension point in the body, so it already ran to completion
    // on this thread.
    assert!(flag.load(Ordering::SeqCst));
    assert_eq!(job.state(), TaskState::Completed);
}

#[tokio::test]
async fn unconfined_resumes_on_the_waking_thread() {
    let scope = Scope::new(Dispatchers::unconfined());
    let (tx, rx) = oneshot::channel::<()>();
    let done = Arc::new(AtomicBool::new(false));
    let done_clone = Arc::clone(&done);

    let job = scope.launch(async move {
        let _ = rx.await;
        done_clone.store(true, Ordering::SeqCst);
        Ok(())
    });

    assert!(!done.load(Ordering::SeqCst));
    // Sending performs the wake, which resumes the body right here.
    tx.send(()).expect("receiver should be alive");
    assert!(done.load(Ordering::SeqCst));
    job.join().await;
    assert_eq!(job.state(), TaskState::Completed);
}

#[tokio::test]
async fn main_dispatcher_runs_in_submission_order() {
    let scope = Scope::new(Dispatchers::main());
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut jobs = Vec::new();

    for i in 0..5 {
        let order = Arc::clone(&order);
        jobs.push(scope.launch(async move {
            order.lock().expect("order lock").push(i);
            Ok(())
        }));
    }

    for job in &jobs {
        job.join().await;
    }
    assert_eq!(*order.lock().expect("order lock"), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn fixed_pool_executes_all_dispatched_work() {
    let scope = Scope::new(Dispatchers::fixed(2));
    let counter = Arc::new(AtomicUsize::new(0));
    let mut jobs = Vec::new();

    for _ in 0..8 {
        let counter = Arc::clone(&counter);
        jobs.push(scope.launch(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
    }

    for job in &jobs {
        job.join().await;
    }
    assert_eq!(counter.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn fixed_worker_count_is_clamped() {
    // Zero workers would be a dispatcher that can never run anything.
    let dispatcher = Dispatchers::fixed(0);
    let scope = Scope::new(dispatcher);
    let job = scope.launch(async move { Ok(()) });
    job.join().await;
    assert_eq!(job.state(), TaskState::Completed);
}
