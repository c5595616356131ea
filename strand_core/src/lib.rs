//! Minimal structured-concurrency runtime: scoped task launching,
//! cooperative cancellation, deferred results and exception routing.

pub mod clock;
pub mod deferred;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod handler;
pub mod scope;
pub mod task;

pub use clock::{delay, delay_until, now};
pub use deferred::Deferred;
pub use dispatcher::{Dispatcher, DispatcherKind, Dispatchers};
pub use error::{TaskError, TaskResult};
pub use executor::{DedicatedExecutor, Executor, TokioExecutor, UnconfinedExecutor};
pub use handler::{ExceptionHandler, HandlerRegistry};
pub use scope::{get_current_scope, try_current_task, with_current_scope, Scope, CURRENT_SCOPE};
pub use task::{TaskHandle, TaskId, TaskKind, TaskState};
