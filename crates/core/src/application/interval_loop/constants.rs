// IntervalLoop constants (no magic values)
use std::time::Duration;

/// How long a running action gets to honor cancellation before its task is aborted (5s)
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(5);

pub const MSG_STARTING: &str = "Starting...";
pub const MSG_CANCELLED_DURING_EXECUTION: &str = "Cancelled during execution.";
pub const MSG_CANCELLED_DURING_DELAY: &str = "Cancelled during interval delay.";
pub const MSG_RUN_ONCE_FINISHED: &str = "Configured to run once, finished.";
