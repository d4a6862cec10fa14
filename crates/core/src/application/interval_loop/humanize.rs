// Human-readable durations for log lines
use std::time::Duration;

/// Render a duration for humans: `400ns`, `850ms`, `3.25s`, `1m 30s`, `2d 4h`.
///
/// Sub-second precision is dropped once the duration reaches a minute.
pub fn humanize_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs == 0 {
        let millis = duration.subsec_millis();
        if millis == 0 && !duration.is_zero() {
            let micros = duration.subsec_micros();
            if micros == 0 {
                return format!("{}ns", duration.subsec_nanos());
            }
            return format!("{}µs", micros);
        }
        return format!("{}ms", millis);
    }

    if total_secs < 60 {
        let millis = duration.subsec_millis();
        if millis == 0 {
            return format!("{}s", total_secs);
        }
        let fraction = format!("{:03}", millis);
        return format!("{}.{}s", total_secs, fraction.trim_end_matches('0'));
    }

    let units = [
        (total_secs / 86_400, "d"),
        (total_secs % 86_400 / 3600, "h"),
        (total_secs % 3600 / 60, "m"),
        (total_secs % 60, "s"),
    ];
    units
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect::<Vec<_>>()
        .join(" ")
}
