//! Elapsed-time arithmetic and human-readable durations.
//!
//! Timestamps are Unix milliseconds (`u64`). Differences are taken as signed
//! milliseconds so that clock skew between devices and the server shows up
//! as a negative span instead of wrapping.

use alloc::format;
use alloc::string::String;

/// Whole seconds between two instants, with negative spans normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Absolute length in whole seconds (truncated).
    pub seconds: u64,
    /// True if `end` preceded `start` and the absolute value was taken.
    pub skewed: bool,
}

/// Signed milliseconds from `start_ms` to `end_ms`.
pub fn signed_millis(start_ms: u64, end_ms: u64) -> i64 {
    end_ms as i64 - start_ms as i64
}

/// Span in whole seconds between `start_ms` and `end_ms`.
///
/// A negative difference is flagged as skewed and measured by absolute value.
pub fn span_seconds(start_ms: u64, end_ms: u64) -> Span {
    let millis = signed_millis(start_ms, end_ms);
    Span {
        seconds: millis.unsigned_abs() / 1000,
        skewed: millis < 0,
    }
}

/// Format a number of seconds for display.
///
/// Shows at most two units: `45s`, `1m 30s`, `2m`, `1h`, `1h 2m`. Seconds are
/// dropped once the value reaches an hour. Negative input formats as `0s`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    if seconds < 3600 {
        let mins = seconds / 60;
        let secs = seconds % 60;
        return if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        };
    }
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    if mins == 0 {
        format!("{}h", hours)
    } else {
        format!("{}h {}m", hours, mins)
    }
}

/// Get current timestamp in milliseconds since Unix epoch.
#[cfg(feature = "std")]
pub fn current_timestamp_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
