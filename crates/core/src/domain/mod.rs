// Domain Layer - Schedules and iteration outcomes

pub mod outcome;
pub mod schedule;

// Re-exports
pub use outcome::{ActionOutcome, NextRun};
pub use schedule::Schedule;
