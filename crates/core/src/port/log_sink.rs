// Log Sink Port
// Leveled message sink for loop lifecycle events

use std::fmt;
use tracing::{error, info, warn};

/// Severity of a lifecycle message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("INFO"),
            LogLevel::Warn => f.write_str("WARN"),
            LogLevel::Error => f.write_str("ERROR"),
        }
    }
}

/// Log sink interface
///
/// Called from every loop checkpoint. A panicking sink loses the message,
/// not the loop.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards messages to `tracing` (production)
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every message in order
    #[derive(Clone, Default)]
    pub struct RecordingLogSink {
        records: Arc<Mutex<Vec<(LogLevel, String)>>>,
    }

    impl RecordingLogSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn records(&self) -> Vec<(LogLevel, String)> {
            self.records.lock().unwrap().clone()
        }

        pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, message)| message.clone())
                .collect()
        }

        /// Number of messages containing `needle`
        pub fn count_containing(&self, needle: &str) -> usize {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, message)| message.contains(needle))
                .count()
        }

        pub fn last(&self) -> Option<(LogLevel, String)> {
            self.records.lock().unwrap().last().cloned()
        }
    }

    impl LogSink for RecordingLogSink {
        fn log(&self, level: LogLevel, message: &str) {
            self.records
                .lock()
                .unwrap()
                .push((level, message.to_string()));
        }
    }
}
