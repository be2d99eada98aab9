//! Machine handle for feeding samples.

use std::sync::Arc;

use parking_lot::Mutex;
use plcwatch_types::{MachineKey, MachineStatus, TelemetrySample};

use crate::detector::{Detector, MachineState, Observation, Outcome};
use crate::log::EventLog;

/// A handle for feeding samples of one machine into the engine.
///
/// Obtain a handle by calling `Engine::register()`. Handles are cheap to
/// clone; every clone shares the same machine state.
///
/// # Example
///
/// ```rust
/// use plcwatch_sdk::{Engine, MachineKey, MachineStatus, TelemetrySample};
///
/// let engine = Engine::new();
/// let handle = engine.register(MachineKey::new("omron", "cp1e").unwrap());
///
/// let sample = TelemetrySample::builder(handle.key().clone())
///     .timestamp_ms(1_000)
///     .plc_running(true)
///     .motor_status(1)
///     .build();
///
/// let observation = handle.apply(&sample, 1_000);
/// assert_eq!(observation.status, MachineStatus::Running);
/// assert_eq!(engine.log().len(), 1);
/// ```
#[derive(Clone)]
pub struct MachineHandle {
    pub(crate) state: Arc<Mutex<MachineState>>,
    pub(crate) detector: Arc<Detector>,
    pub(crate) log: Arc<EventLog>,
    pub(crate) key: MachineKey,
}

impl MachineHandle {
    /// Classify a sample and log the transitions it causes.
    ///
    /// The machine stays locked until the events are appended, so the log
    /// order for a machine always matches the order samples were applied.
    /// Samples for other machines are ignored.
    pub fn apply(&self, sample: &TelemetrySample, now_ms: u64) -> Observation {
        if sample.machine_key != self.key {
            tracing::warn!(
                handle = %self.key,
                sample = %sample.machine_key,
                "sample applied to the wrong machine handle"
            );
            return Observation {
                status: MachineStatus::Stopped,
                events: Vec::new(),
                outcome: Outcome::Malformed,
            };
        }
        if !sample.is_well_formed() {
            return self.detector.observe(sample, now_ms);
        }

        let mut state = self.state.lock();
        let observation = state.observe(
            sample,
            now_ms,
            self.detector.thresholds(),
            self.detector.tracks_legacy(),
        );
        self.log.extend(observation.events.iter().cloned());
        observation
    }

    /// Re-classify this machine at `now_ms` and log a decay if one occurred.
    pub fn refresh(&self, now_ms: u64) -> Option<MachineStatus> {
        let mut state = self.state.lock();
        let event = state.refresh(now_ms, self.detector.thresholds())?;
        let status = event.current_status;
        self.log.append(event);
        Some(status)
    }

    /// Current derived status.
    pub fn status(&self, now_ms: u64) -> MachineStatus {
        self.state.lock().status_at(now_ms, self.detector.thresholds())
    }

    /// Timestamp of the latest accepted sample.
    pub fn last_seen_ms(&self) -> Option<u64> {
        self.state.lock().last_seen_ms()
    }

    pub fn key(&self) -> &MachineKey {
        &self.key
    }
}

impl std::fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MachineHandle")
            .field("key", &self.key)
            .finish()
    }
}
