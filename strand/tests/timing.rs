//! Timing-sensitive properties of the runtime, run against Tokio's
//! paused test clock so elapsed virtual time is exact.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use strand::{await_all, delay, now, with_timeout, Dispatchers, Scope, TaskError, TaskState};

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn sequential_suspending_calls_do_not_overlap() {
    let scope = Scope::new(Dispatchers::default());
    let started = now();

    let chain = scope.async_task(async move {
        delay(secs(1)).await?;
        let first_done = now();
        // The second call's work starts only after the first returned.
        delay(secs(1)).await?;
        Ok::<_, TaskError>((first_done, now()))
    });

    let (first_done, second_done) = chain.await.expect("chain should complete");
    assert!(second_done >= first_done + secs(1));
    assert!(now() - started >= secs(2));
}

#[tokio::test(start_paused = true)]
async fn async_tasks_run_concurrently() {
    let scope = Scope::new(Dispatchers::default());
    let started = now();

    let slow = scope.async_task(async move {
        delay(secs(3)).await?;
        Ok::<_, TaskError>(1)
    });
    let fast = scope.async_task(async move {
        delay(secs(2)).await?;
        Ok::<_, TaskError>(2)
    });

    let values = await_all(vec![slow, fast]).await.expect("both should complete");
    assert_eq!(values, vec![1, 2]);

    // Wall time is the max of the two durations, not the sum.
    let elapsed = now() - started;
    assert!(elapsed >= secs(3) && elapsed < secs(4), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn scope_runs_parallel_tasks_in_one_pass() {
    let scope = Scope::new(Dispatchers::default());
    let started = now();

    let a = scope.launch(async move {
        delay(secs(3)).await?;
        Ok(())
    });
    let b = scope.launch(async move {
        delay(secs(3)).await?;
        Ok(())
    });

    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert_eq!(a.state(), TaskState::Completed);
    assert_eq!(b.state(), TaskState::Completed);

    scope.close().await;
    let elapsed = now() - started;
    assert!(elapsed >= secs(3) && elapsed < secs(4), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn timeout_fires_at_the_deadline_not_the_body_duration() {
    let started = now();

    // Five seconds of work with a one-second-interval suspension point.
    let outcome = with_timeout(secs(1), async move {
        for _ in 0..5 {
            delay(secs(1)).await?;
        }
        Ok::<_, TaskError>(())
    })
    .await;

    match outcome {
        Err(TaskError::TimedOut(deadline)) => assert_eq!(deadline, secs(1)),
        other => panic!("expected timeout, got {other:?}"),
    }
    let elapsed = now() - started;
    assert!(elapsed >= secs(1) && elapsed < secs(2), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn cooperative_loop_observes_exactly_three_iterations() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticks_clone = Arc::clone(&ticks);

    let outcome = with_timeout(Duration::from_millis(3500), async move {
        for _ in 0..5 {
            delay(secs(1)).await?;
            ticks_clone.fetch_add(1, Ordering::SeqCst);
        }
        Ok::<_, TaskError>(())
    })
    .await;

    assert!(matches!(outcome, Err(TaskError::TimedOut(_))));
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn body_finishing_before_the_deadline_keeps_its_value() {
    let outcome = with_timeout(secs(10), async move {
        delay(secs(1)).await?;
        Ok::<_, TaskError>("done")
    })
    .await;

    assert_eq!(outcome.expect("body should beat the deadline"), "done");
}

#[tokio::test(start_paused = true)]
async fn caller_cancellation_wins_over_the_timeout() {
    let scope = Scope::new(Dispatchers::default());

    let job = scope.launch(async move {
        with_timeout(secs(60), async move {
            delay(secs(30)).await?;
            Ok::<_, TaskError>(())
        })
        .await?;
        Ok(())
    });

    tokio::time::sleep(Duration::from_millis(5)).await;
    scope.close().await;

    // Torn down by its scope, not by the deadline.
    assert_eq!(job.state(), TaskState::Cancelled);
}
