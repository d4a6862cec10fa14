// Central Error Type for the Core Crate

use thiserror::Error;

/// Core error type
///
/// Only construction and configuration can fail. A running `IntervalLoop`
/// never returns one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid schedule '{input}': {reason}")]
    InvalidSchedule { input: String, reason: String },
}

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;
