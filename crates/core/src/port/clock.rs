// Clock Port (for testability)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;

/// Clock interface used by IntervalLoop
///
/// `now` is monotonic and only used for measuring elapsed time.
/// `wall_clock` is only used to render the next start time in logs.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn wall_clock(&self) -> DateTime<Utc>;

    /// Sleep for `duration`. The loop races this against its cancel token,
    /// so implementations need not watch cancellation themselves.
    async fn sleep(&self, duration: Duration);
}

/// Tokio-backed clock (production)
///
/// Honors `tokio::time::pause`, which keeps tests deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
