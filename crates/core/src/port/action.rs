// Loop Action Port
// The work an IntervalLoop repeats

use crate::cancel::CancelToken;
use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

/// Action errors
///
/// `Cancelled` is the only variant the loop treats as a graceful stop;
/// everything else is logged as a failed iteration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Process exited with code {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(String),
}

impl ActionError {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        ActionError::Failed(message.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ActionError::Cancelled)
    }
}

impl From<std::io::Error> for ActionError {
    fn from(err: std::io::Error) -> Self {
        ActionError::Io(err.to_string())
    }
}

/// Loop Action trait
///
/// Implementations:
/// - FnAction: wraps an async closure
/// - CommandAction (infra-system): runs an external command
#[async_trait]
pub trait LoopAction: Send + Sync {
    /// Perform one unit of work
    ///
    /// The token is the loop's own cancel token. Long-running work should
    /// watch it and return `ActionError::Cancelled` once it fires.
    async fn execute(&self, cancel: &CancelToken) -> Result<(), ActionError>;
}

/// Adapter turning an async closure into a `LoopAction`
///
/// # Example
/// ```text
/// let action = FnAction::new(|_cancel| async {
///     println!("tick");
///     Ok(())
/// });
/// ```
pub struct FnAction<F> {
    f: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn(CancelToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> LoopAction for FnAction<F>
where
    F: Fn(CancelToken) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ActionError>> + Send,
{
    async fn execute(&self, cancel: &CancelToken) -> Result<(), ActionError> {
        (self.f)(cancel.clone()).await
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    /// What a scripted invocation does
    #[derive(Debug, Clone)]
    pub enum ActionStep {
        /// Return Ok immediately
        Succeed,
        /// Return a failure immediately
        Fail(String),
        /// Sleep for the duration, then succeed (returns Cancelled if the token fires first)
        Work(Duration),
        /// Wait for the token, then return Cancelled
        UntilCancelled,
        /// Never return and ignore the token
        Hang,
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Scripted action for testing
    ///
    /// Invocation `n` runs `steps[n]`; once the script is exhausted the last
    /// step repeats.
    pub struct ScriptedAction {
        steps: Vec<ActionStep>,
        starts: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedAction {
        pub fn new(steps: Vec<ActionStep>) -> Self {
            Self {
                steps,
                starts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn repeat(step: ActionStep) -> Self {
            Self::new(vec![step])
        }

        pub fn call_count(&self) -> usize {
            self.starts.lock().unwrap().len()
        }

        /// Instants at which each invocation began
        pub fn start_times(&self) -> Vec<Instant> {
            self.starts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LoopAction for ScriptedAction {
        async fn execute(&self, cancel: &CancelToken) -> Result<(), ActionError> {
            let step = {
                let mut starts = self.starts.lock().unwrap();
                let index = starts.len();
                starts.push(Instant::now());
                self.steps
                    .get(index)
                    .or_else(|| self.steps.last())
                    .cloned()
                    .unwrap_or(ActionStep::Succeed)
            };

            match step {
                ActionStep::Succeed => Ok(()),
                ActionStep::Fail(message) => Err(ActionError::Failed(message)),
                ActionStep::Work(duration) => {
                    tokio::select! {
                        _ = tokio::time::sleep(duration) => Ok(()),
                        _ = cancel.cancelled() => Err(ActionError::Cancelled),
                    }
                }
                ActionStep::UntilCancelled => {
                    cancel.cancelled().await;
                    Err(ActionError::Cancelled)
                }
                ActionStep::Hang => std::future::pending().await,
                ActionStep::Panic(message) => {
                    panic!("{}", message)
                }
            }
        }
    }
}
