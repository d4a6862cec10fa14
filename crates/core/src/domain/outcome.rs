// Iteration outcomes

use std::time::Duration;

/// How a single action invocation ended, as seen by the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action returned normally
    Completed,
    /// The action stopped because the cancel token fired
    Cancelled,
    /// The action failed for any other reason (error or panic)
    Failed(String),
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }
}

/// What the loop does after an iteration has been measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRun {
    /// One-shot schedule: no further iterations
    Stop,
    /// Zero-delay schedule: start the next iteration right away
    Immediately,
    /// Wait this long before starting the next iteration (always > 0)
    Sleep(Duration),
    /// The invocation took at least as long as the interval; start again right away
    Overran { elapsed: Duration, interval: Duration },
}
