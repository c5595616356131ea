//! Kotlin-like macros for strand
//!
//! Thin `macro_rules!` sugar over the scope API so launch sites read
//! like the coroutine builders they imitate.

/// Launch a fire-and-forget task on a scope.
///
/// The body is wrapped into a `TaskResult<()>` future, so `?` works on
/// suspension points directly.
///
/// # Examples
/// ```ignore
/// let job = launch!(scope => {
///     delay_ms!(100);
///     println!("done");
/// });
///
/// // On an explicit dispatcher:
/// let job = launch!(scope, Dispatchers::io() => { fetch().await?; });
/// ```
#[macro_export]
macro_rules! launch {
    ($scope:expr => $($body:tt)*) => {
        $scope.launch(async move {
            $($body)*
            Ok::<(), $crate::TaskError>(())
        })
    };
    ($scope:expr, $dispatcher:expr => $($body:tt)*) => {
        $scope.launch_on($dispatcher, async move {
            $($body)*
            Ok::<(), $crate::TaskError>(())
        })
    };
}

/// Start a result-bearing task on a scope; the body is an expression
/// whose value becomes the deferred's result.
///
/// # Examples
/// ```ignore
/// let user = async_task!(scope => load_user(id).await?);
/// let value = user.await?;
/// ```
#[macro_export]
macro_rules! async_task {
    ($scope:expr => $body:expr) => {
        $scope.async_task(async move { Ok::<_, $crate::TaskError>($body) })
    };
    ($scope:expr, $dispatcher:expr => $body:expr) => {
        $scope.async_task_on($dispatcher, async move { Ok::<_, $crate::TaskError>($body) })
    };
}

/// Create a scope bound to a dispatcher (the default one when omitted).
///
/// # Examples
/// ```ignore
/// let scope = scope!();
/// let io_scope = scope!(Dispatchers::io());
/// ```
#[macro_export]
macro_rules! scope {
    () => {
        $crate::Scope::new($crate::Dispatchers::default())
    };
    ($dispatcher:expr) => {
        $crate::Scope::new($dispatcher)
    };
}

/// Suspend the current task for the given number of milliseconds,
/// observing cancellation. Expands to an expression that must run
/// inside an async body returning `TaskResult`.
///
/// # Examples
/// ```ignore
/// delay_ms!(500);
/// ```
#[macro_export]
macro_rules! delay_ms {
    ($millis:expr) => {
        $crate::delay(::std::time::Duration::from_millis($millis)).await?
    };
}
