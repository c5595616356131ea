//! Ergonomic layer over `strand_core`: multi-await composition, the
//! bounded-time wrapper and Kotlin-flavoured launch sugar.

pub mod combining;
pub mod macros;
pub mod timeout;

pub use combining::{await_all, join_all};
pub use timeout::with_timeout;

// Re-export the full core surface so `strand` is the only crate most
// callers need.
pub use strand_core::{
    delay, delay_until, get_current_scope, now, try_current_task, with_current_scope,
    DedicatedExecutor, Deferred, Dispatcher, DispatcherKind, Dispatchers, ExceptionHandler,
    Executor, HandlerRegistry, Scope, TaskError, TaskHandle, TaskId, TaskKind, TaskResult,
    TaskState, TokioExecutor, CURRENT_SCOPE,
};

// Re-export scope module for macros and advanced composition.
pub use strand_core::scope;

// Macros: launch!, async_task!, scope!, delay_ms! (exported via
// #[macro_export]).
