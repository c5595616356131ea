use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use strand::{async_task, delay_ms, launch, scope, Dispatchers, TaskState};

#[tokio::test(start_paused = true)]
async fn launch_macro_runs_the_body() {
    let scope = scope!();
    let flag = Arc::new(AtomicBool::new(false));
    let flag_clone = Arc::clone(&flag);

    let job = launch!(scope => {
        delay_ms!(10);
        flag_clone.store(true, Ordering::SeqCst);
    });

    job.join().await;
    assert!(flag.load(Ordering::SeqCst));
    assert_eq!(job.state(), TaskState::Completed);
}

#[tokio::test]
async fn launch_macro_accepts_an_explicit_dispatcher() {
    let scope = scope!();
    let flag = Arc::new(AtomicBool::new(false));
    let flag_clone = Arc::clone(&flag);

    let job = launch!(scope, Dispatchers::io() => {
        flag_clone.store(true, Ordering::SeqCst);
    });

    job.join().await;
    assert!(flag.load(Ordering::SeqCst));
}

#[tokio::test]
async fn async_task_macro_returns_the_expression_value() {
    let scope = scope!(Dispatchers::default());

    let deferred = async_task!(scope => 21 * 2);

    assert_eq!(deferred.await.expect("value"), 42);
}
