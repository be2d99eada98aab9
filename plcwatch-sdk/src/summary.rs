//! Fleet-level downtime counters.

use plcwatch_types::{format_duration, span_seconds, StoppageInterval};

/// Aggregate view over a set of stoppage intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoppageSummary {
    pub total_count: usize,
    pub ongoing_count: usize,
    /// Sum of all durations; ongoing stoppages count up to `now`.
    pub total_downtime_seconds: u64,
    /// Whole-second mean, 0 when there are no intervals.
    pub mean_duration_seconds: u64,
}

impl StoppageSummary {
    pub fn total_downtime_display(&self) -> String {
        format_duration(self.total_downtime_seconds as i64)
    }

    pub fn mean_duration_display(&self) -> String {
        format_duration(self.mean_duration_seconds as i64)
    }
}

/// Reduce intervals to summary counters as of `now_ms`.
pub fn summarize(intervals: &[StoppageInterval], now_ms: u64) -> StoppageSummary {
    let total_count = intervals.len();
    let ongoing_count = intervals.iter().filter(|i| i.is_ongoing).count();
    let total_downtime_seconds: u64 = intervals
        .iter()
        .map(|i| {
            if i.is_ongoing {
                span_seconds(i.start_ms, now_ms).seconds
            } else {
                i.duration_seconds
            }
        })
        .sum();
    let mean_duration_seconds = if total_count == 0 {
        0
    } else {
        total_downtime_seconds / total_count as u64
    };

    StoppageSummary {
        total_count,
        ongoing_count,
        total_downtime_seconds,
        mean_duration_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcwatch_types::{MachineKey, Readings};

    fn interval(start_ms: u64, end_ms: Option<u64>, duration_seconds: u64) -> StoppageInterval {
        StoppageInterval {
            machine_key: MachineKey::new("a", "b").unwrap(),
            start_ms,
            end_ms,
            duration_seconds,
            is_ongoing: end_ms.is_none(),
            clock_skew: false,
            readings: Readings::default(),
        }
    }

    #[test]
    fn empty_summary_is_zero() {
        let summary = summarize(&[], 1_000);
        assert_eq!(summary, StoppageSummary::default());
        assert_eq!(summary.mean_duration_display(), "0s");
    }

    #[test]
    fn ongoing_counts_up_to_now() {
        let intervals = vec![
            interval(0, Some(90_000), 90),
            interval(100_000, None, 0),
        ];
        let summary = summarize(&intervals, 130_000);

        assert_eq!(summary.total_count, 2);
        assert_eq!(summary.ongoing_count, 1);
        assert_eq!(summary.total_downtime_seconds, 120);
        assert_eq!(summary.mean_duration_seconds, 60);
        assert_eq!(summary.total_downtime_display(), "2m");
        assert_eq!(summary.mean_duration_display(), "1m");
    }

    #[test]
    fn mean_is_floored() {
        let intervals = vec![interval(0, Some(1_000), 1), interval(0, Some(2_000), 2)];
        assert_eq!(summarize(&intervals, 0).mean_duration_seconds, 1);
    }
}
