// Application Layer - Loop driver

pub mod interval_loop;

// Re-exports
pub use interval_loop::{humanize_duration, IntervalLoop, PrefixedLogger};
