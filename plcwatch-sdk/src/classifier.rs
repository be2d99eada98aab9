//! Freshness-based liveness classification.
//!
//! A sample's own flags are only trusted while the sample is fresh. Once the
//! feed goes quiet the machine decays to idle and then to stopped, whatever
//! the last payload claimed.

use std::time::Duration;

use plcwatch_types::{signed_millis, MachineStatus, TelemetrySample};

/// Age after which a machine is shown as idle regardless of its flags.
pub const IDLE_AFTER: Duration = Duration::from_secs(20);

/// Age after which a machine is considered stopped regardless of its flags.
pub const STOPPED_AFTER: Duration = Duration::from_secs(30);

/// Staleness thresholds for the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessThresholds {
    /// Samples older than this classify as idle.
    pub idle_after: Duration,
    /// Samples older than this classify as stopped.
    pub stopped_after: Duration,
}

impl Default for LivenessThresholds {
    fn default() -> Self {
        Self {
            idle_after: IDLE_AFTER,
            stopped_after: STOPPED_AFTER,
        }
    }
}

impl LivenessThresholds {
    /// Returns true if the idle window ends before the stopped window starts.
    pub fn is_valid(&self) -> bool {
        self.idle_after < self.stopped_after
    }
}

/// Classify a sample as seen at `now_ms`.
///
/// Pure function of its inputs. A sample without a timestamp is stopped.
/// A sample from the future (negative age, clock skew) counts as fresh.
pub fn classify(
    sample: &TelemetrySample,
    now_ms: u64,
    thresholds: &LivenessThresholds,
) -> MachineStatus {
    let Some(ts) = sample.timestamp_ms else {
        return MachineStatus::Stopped;
    };

    let age_ms = signed_millis(ts, now_ms);
    if age_ms > thresholds.stopped_after.as_millis() as i64 {
        return MachineStatus::Stopped;
    }
    if age_ms > thresholds.idle_after.as_millis() as i64 {
        return MachineStatus::Idle;
    }

    classify_flags(sample)
}

/// Status implied by the reported flags alone, ignoring freshness.
pub fn classify_flags(sample: &TelemetrySample) -> MachineStatus {
    let running = sample.plc_running || sample.motor_on() || sample.production_on();
    let idle_base = sample.plc_running && !sample.production_on() && !sample.motor_on();

    if running {
        MachineStatus::Running
    } else if idle_base {
        MachineStatus::Idle
    } else {
        MachineStatus::Stopped
    }
}
