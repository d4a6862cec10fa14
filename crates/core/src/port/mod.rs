// Port Layer - Interfaces for the loop's collaborators

pub mod action;
pub mod clock;
pub mod log_sink;

// Re-exports
pub use action::{ActionError, FnAction, LoopAction};
pub use clock::{Clock, SystemClock};
pub use log_sink::{LogLevel, LogSink, TracingLogSink};
