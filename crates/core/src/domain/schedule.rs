// Schedule - how often an IntervalLoop repeats its action

use crate::domain::NextRun;
use crate::error::{CoreError, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Target spacing between the starts of consecutive action invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schedule {
    /// Start a new invocation at most once per interval (always > 0)
    Every(Duration),
    /// Run the action exactly once, then stop
    Once,
    /// Start the next invocation as soon as the previous one is finished
    Immediate,
}

impl Schedule {
    /// Build an interval schedule. A zero duration means `Immediate`.
    pub fn every(interval: Duration) -> Self {
        if interval.is_zero() {
            Schedule::Immediate
        } else {
            Schedule::Every(interval)
        }
    }

    pub fn is_once(&self) -> bool {
        matches!(self, Schedule::Once)
    }

    /// Configured interval, if any
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Schedule::Every(interval) => Some(*interval),
            Schedule::Once | Schedule::Immediate => None,
        }
    }

    /// Decide what follows an invocation that took `elapsed`.
    ///
    /// # Example
    /// ```text
    /// let schedule = Schedule::every(Duration::from_secs(10));
    /// assert_eq!(
    ///     schedule.next_run(Duration::from_secs(3)),
    ///     NextRun::Sleep(Duration::from_secs(7)),
    /// );
    /// ```
    pub fn next_run(&self, elapsed: Duration) -> NextRun {
        match self {
            Schedule::Once => NextRun::Stop,
            Schedule::Immediate => NextRun::Immediately,
            Schedule::Every(interval) => match interval.checked_sub(elapsed) {
                Some(remaining) if !remaining.is_zero() => NextRun::Sleep(remaining),
                _ => NextRun::Overran {
                    elapsed,
                    interval: *interval,
                },
            },
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Schedule::Every(Duration::from_secs(60))
    }
}

impl From<Duration> for Schedule {
    fn from(interval: Duration) -> Self {
        Schedule::every(interval)
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Once => f.write_str("once"),
            Schedule::Immediate => f.write_str("immediate"),
            Schedule::Every(interval) => {
                let ms = interval.as_millis();
                if ms % 3_600_000 == 0 {
                    write!(f, "{}h", ms / 3_600_000)
                } else if ms % 60_000 == 0 {
                    write!(f, "{}m", ms / 60_000)
                } else if ms % 1000 == 0 {
                    write!(f, "{}s", ms / 1000)
                } else {
                    write!(f, "{}ms", ms)
                }
            }
        }
    }
}

impl FromStr for Schedule {
    type Err = CoreError;

    /// Accepts `once`, `immediate`, or a duration such as `250ms`, `10s`, `5m`, `1h`.
    /// Bare integers are milliseconds.
    fn from_str(s: &str) -> Result<Self> {
        let input = s.trim().to_ascii_lowercase();
        let invalid = |reason: &str| CoreError::InvalidSchedule {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        match input.as_str() {
            "" => return Err(invalid("empty value")),
            "once" => return Ok(Schedule::Once),
            "immediate" => return Ok(Schedule::Immediate),
            _ => {}
        }

        let split = input
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(input.len());
        let (digits, unit) = input.split_at(split);
        if digits.is_empty() {
            return Err(invalid("expected a number, 'once' or 'immediate'"));
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| invalid("number out of range"))?;

        let millis_per_unit: u64 = match unit.trim() {
            "" | "ms" => 1,
            "s" => 1000,
            "m" => 60_000,
            "h" => 3_600_000,
            _ => return Err(invalid("unknown unit (use ms, s, m or h)")),
        };
        let millis = value
            .checked_mul(millis_per_unit)
            .ok_or_else(|| invalid("number out of range"))?;

        Ok(Schedule::every(Duration::from_millis(millis)))
    }
}
