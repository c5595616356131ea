use std::sync::Arc;
use std::time::Duration;

use strand::{
    await_all, delay, with_timeout, Dispatchers, Scope, TaskError, TaskId, TaskResult,
};

// Simulate a user model
#[derive(Clone, Debug)]
struct User {
    id: u32,
    name: String,
}

/// Simulate fetching a user from a remote API: an opaque
/// latency-injecting operation.
async fn fetch_user(id: u32) -> TaskResult<User> {
    delay(Duration::from_millis(300)).await?;
    Ok(User {
        id,
        name: format!("user-{id}"),
    })
}

/// Basic launch / join on a scope.
async fn example_basic_scope() {
    println!("=== Example: Basic Scope ===");
    let scope = Scope::new(Dispatchers::default());

    let job = scope.launch(async {
        println!("Hello from a task!");
        delay(Duration::from_millis(100)).await?;
        println!("Task completed!");
        Ok(())
    });

    job.join().await;
    println!();
}

/// Two deferreds run concurrently; awaiting both takes roughly the
/// slower one, not the sum.
async fn example_concurrent_fetch() {
    println!("=== Example: Concurrent Fetch ===");
    let scope = Scope::new(Dispatchers::io());

    let first = scope.async_task(fetch_user(1));
    let second = scope.async_task(fetch_user(2));

    match await_all(vec![first, second]).await {
        Ok(users) => println!("fetched: {users:?}"),
        Err(err) => println!("fetch failed: {err}"),
    }
    println!();
}

/// A deadline around a slow body; cancellation is cooperative.
async fn example_timeout() {
    println!("=== Example: Timeout ===");
    let outcome: TaskResult<User> =
        with_timeout(Duration::from_millis(100), fetch_user(3)).await;
    match outcome {
        Ok(user) => println!("somehow fast enough: {user:?}"),
        Err(TaskError::TimedOut(after)) => println!("gave up after {after:?}"),
        Err(err) => println!("failed: {err}"),
    }
    println!();
}

/// Failures in fire-and-forget tasks land in the scope's handler.
async fn example_exception_handler() {
    println!("=== Example: Exception Handler ===");
    let scope = Scope::new(Dispatchers::default());
    scope.install_exception_handler(Arc::new(|task: TaskId, err: &TaskError| {
        println!("handler caught failure of {task}: {err}");
    }));

    let job = scope.launch(async {
        delay(Duration::from_millis(50)).await?;
        Err(TaskError::msg("backend exploded"))
    });
    job.join().await;

    scope.close().await;
    println!();
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    example_basic_scope().await;
    example_concurrent_fetch().await;
    example_timeout().await;
    example_exception_handler().await;
}
