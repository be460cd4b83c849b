//! Execution modes and the queue that correlates deferred replies by position.

mod deferred;
mod mode;

pub(crate) use deferred::{DeferredQueue, QueueEntry};
pub(crate) use mode::ModeState;
pub use mode::ExecutionMode;
