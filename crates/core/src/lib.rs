// Cadence Core - IntervalLoop, Schedules & Ports
// NO infrastructure dependencies (actions that touch the OS live in infra crates)

pub mod application;
pub mod cancel;
pub mod domain;
pub mod error;
pub mod port;

pub use application::IntervalLoop;
pub use cancel::{cancel_channel, CancelSource, CancelToken};
pub use domain::{ActionOutcome, NextRun, Schedule};
pub use error::{CoreError, Result};
pub use port::{ActionError, FnAction, LoopAction};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
