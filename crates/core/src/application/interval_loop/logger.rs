// Name-prefixing logger adapter
use super::panic_guard::execute_guarded;
use crate::port::{LogLevel, LogSink};
use std::sync::Arc;
use tracing::warn;

/// Wraps a `LogSink` so every message starts with `[<name>] `.
///
/// A sink that panics loses that one message; the panic never reaches the loop.
#[derive(Clone)]
pub struct PrefixedLogger {
    prefix: String,
    sink: Arc<dyn LogSink>,
}

impl PrefixedLogger {
    pub fn new(name: &str, sink: Arc<dyn LogSink>) -> Self {
        Self {
            prefix: format!("[{}] ", name),
            sink,
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }
}

impl LogSink for PrefixedLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let line = format!("{}{}", self.prefix, message);
        if let Err(panic_msg) = execute_guarded(|| self.sink.log(level, &line)) {
            warn!(panic_msg = %panic_msg, level = %level, "Log sink panicked, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::log_sink::mocks::RecordingLogSink;

    #[test]
    fn test_prefixes_every_level() {
        let sink = RecordingLogSink::new();
        let logger = PrefixedLogger::new("heartbeat", Arc::new(sink.clone()));

        logger.info("Starting...");
        logger.warn("slow");
        logger.error(String::from("Failed: boom"));

        assert_eq!(
            sink.records(),
            vec![
                (LogLevel::Info, "[heartbeat] Starting...".to_string()),
                (LogLevel::Warn, "[heartbeat] slow".to_string()),
                (LogLevel::Error, "[heartbeat] Failed: boom".to_string()),
            ]
        );
    }

    struct ExplodingSink;

    impl LogSink for ExplodingSink {
        fn log(&self, _level: LogLevel, message: &str) {
            panic!("cannot write {}", message);
        }
    }

    #[test]
    fn test_panicking_sink_is_contained() {
        let logger = PrefixedLogger::new("heartbeat", Arc::new(ExplodingSink));

        logger.info("Starting...");
        logger.error("Failed: boom");
    }
}
