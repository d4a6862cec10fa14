// IntervalLoop - Repeats an action on a self-correcting timer

mod action_task;
pub mod constants;
mod humanize;
mod logger;
mod panic_guard;


use action_task::ActionTask;
use constants::*;
pub use humanize::humanize_duration;
pub use logger::PrefixedLogger;

use crate::cancel::CancelToken;
use crate::domain::{ActionOutcome, NextRun, Schedule};
use crate::port::{ActionError, Clock, LogSink, LoopAction, SystemClock, TracingLogSink};
use chrono::SecondsFormat;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info_span, Instrument};

/// IntervalLoop invokes one action repeatedly, keeping at least the configured
/// interval between the starts of consecutive invocations.
///
/// `run` never fails. Action errors and panics are logged and the next
/// iteration runs as usual; the loop only stops when its cancel token fires
/// or, for `Schedule::Once`, after the single iteration.
pub struct IntervalLoop {
    name: String,
    schedule: Schedule,
    action: Arc<dyn LoopAction>,
    clock: Arc<dyn Clock>,
    logger: PrefixedLogger,
    cancel_grace: Duration,
}

impl IntervalLoop {
    /// Create a loop that logs through `tracing` and uses the Tokio clock
    ///
    /// # Example
    /// ```text
    /// let (source, token) = cancel_channel();
    /// let heartbeat = IntervalLoop::new(
    ///     "heartbeat",
    ///     Schedule::every(Duration::from_secs(10)),
    ///     Arc::new(FnAction::new(|_cancel| async { Ok(()) })),
    /// );
    /// let handle = heartbeat.spawn(token);
    /// ```
    pub fn new(name: impl Into<String>, schedule: Schedule, action: Arc<dyn LoopAction>) -> Self {
        let name = name.into();
        let logger = PrefixedLogger::new(&name, Arc::new(TracingLogSink));
        Self {
            name,
            schedule,
            action,
            clock: Arc::new(SystemClock),
            logger,
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Route lifecycle messages to `sink` (still prefixed with the loop name)
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.logger = PrefixedLogger::new(&self.name, sink);
        self
    }

    /// How long a running action may take to honor cancellation before it is aborted
    pub fn with_cancel_grace(mut self, cancel_grace: Duration) -> Self {
        self.cancel_grace = cancel_grace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    /// Run the loop on its own Tokio task
    pub fn spawn(self, cancel: CancelToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Run until `cancel` fires (or once, for `Schedule::Once`)
    pub async fn run(&self, cancel: CancelToken) {
        let span = info_span!(
            "interval_loop",
            loop_name = %self.name,
            schedule = %self.schedule
        );
        self.run_loop(&cancel).instrument(span).await
    }

    async fn run_loop(&self, cancel: &CancelToken) {
        loop {
            // Never start an invocation after cancellation
            if cancel.is_cancelled() {
                return;
            }

            let elapsed = self.run_iteration(cancel).await;

            let next = self.schedule.next_run(elapsed);
            if next == NextRun::Stop {
                self.logger.info(MSG_RUN_ONCE_FINISHED);
                return;
            }
            if cancel.is_cancelled() {
                return;
            }

            match next {
                NextRun::Stop | NextRun::Immediately => {}
                NextRun::Overran { elapsed, interval } => {
                    self.logger.warn(format!(
                        "Execution took {}, longer than the configured interval of {}; next run starts immediately.",
                        humanize_duration(elapsed),
                        humanize_duration(interval)
                    ));
                }
                NextRun::Sleep(remaining) => {
                    self.log_next_run(remaining);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            self.logger.info(MSG_CANCELLED_DURING_DELAY);
                            return;
                        }
                        _ = self.clock.sleep(remaining) => {}
                    }
                }
            }
        }
    }

    /// One measured invocation; returns how long it took
    async fn run_iteration(&self, cancel: &CancelToken) -> Duration {
        let started = self.clock.now();
        self.logger.info(MSG_STARTING);

        match self.execute_action(cancel).await {
            ActionOutcome::Completed => {}
            ActionOutcome::Cancelled => self.logger.info(MSG_CANCELLED_DURING_EXECUTION),
            ActionOutcome::Failed(reason) => self.logger.error(format!("Failed: {}", reason)),
        }

        let elapsed = self.clock.now().saturating_duration_since(started);
        self.logger
            .info(format!("Finished in {}.", humanize_duration(elapsed)));
        elapsed
    }

    /// Execute the action with panic isolation
    ///
    /// The action runs on its own task so a panic surfaces as a `JoinError`
    /// instead of unwinding through the loop. The task is owned by this call
    /// and aborted if the call is dropped.
    async fn execute_action(&self, cancel: &CancelToken) -> ActionOutcome {
        let action = Arc::clone(&self.action);
        let token = cancel.clone();
        let mut task = ActionTask::new(tokio::spawn(
            async move { action.execute(&token).await }.in_current_span(),
        ));

        let finished = tokio::select! {
            biased;
            joined = task.handle_mut() => Some(joined),
            _ = cancel.cancelled() => None,
        };
        if let Some(joined) = finished {
            return classify(joined);
        }

        // Cancelled mid-action: give it the grace period to wind down
        let graced = tokio::select! {
            joined = task.handle_mut() => Some(joined),
            _ = self.clock.sleep(self.cancel_grace) => None,
        };
        let Some(joined) = graced else {
            task.abort();
            self.logger.warn(format!(
                "Action did not stop within {} of cancellation; aborted.",
                humanize_duration(self.cancel_grace)
            ));
            return ActionOutcome::Cancelled;
        };

        classify(joined)
    }

    fn log_next_run(&self, remaining: Duration) {
        let next_start = chrono::Duration::from_std(remaining)
            .ok()
            .and_then(|delta| self.clock.wall_clock().checked_add_signed(delta));

        match next_start {
            Some(at) => self.logger.info(format!(
                "Next run in {} at {}.",
                humanize_duration(remaining),
                at.to_rfc3339_opts(SecondsFormat::Millis, true)
            )),
            None => self
                .logger
                .info(format!("Next run in {}.", humanize_duration(remaining))),
        }
    }
}

fn classify(joined: Result<Result<(), ActionError>, JoinError>) -> ActionOutcome {
    match joined {
        Ok(Ok(())) => ActionOutcome::Completed,
        Ok(Err(ActionError::Cancelled)) => ActionOutcome::Cancelled,
        Ok(Err(err)) => ActionOutcome::Failed(err.to_string()),
        Err(join_err) if join_err.is_panic() => {
            let payload = join_err.into_panic();
            ActionOutcome::Failed(format!(
                "action panicked: {}",
                panic_guard::panic_message(payload.as_ref())
            ))
        }
        Err(_) => ActionOutcome::Cancelled,
    }
}
