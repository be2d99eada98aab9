//! Per-machine transition detection.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use plcwatch_types::{MachineKey, MachineStatus, StatusEvent, TelemetrySample};

use crate::classifier::{classify, LivenessThresholds};

/// What happened to a sample handed to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The sample became the machine's latest sample.
    Accepted,
    /// The sample had no timestamp. Classified stopped, state untouched.
    Malformed,
    /// The sample is older than the machine's latest sample.
    OutOfOrder,
    /// The sample carries the same timestamp as the latest sample.
    Duplicate,
}

/// Result of observing one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Status of the sample itself at `now`.
    pub status: MachineStatus,
    /// Events to append to the log, in order.
    pub events: Vec<StatusEvent>,
    pub outcome: Outcome,
}

impl Observation {
    fn without_events(status: MachineStatus, outcome: Outcome) -> Self {
        Self {
            status,
            events: Vec::new(),
            outcome,
        }
    }
}

/// Last-known state of a single machine.
#[derive(Debug)]
pub struct MachineState {
    key: MachineKey,
    last_status: Option<MachineStatus>,
    last_running_flag: Option<bool>,
    latest: Option<TelemetrySample>,
    last_event_ms: Option<u64>,
}

impl MachineState {
    pub fn new(key: MachineKey) -> Self {
        Self {
            key,
            last_status: None,
            last_running_flag: None,
            latest: None,
            last_event_ms: None,
        }
    }

    pub fn key(&self) -> &MachineKey {
        &self.key
    }

    /// Status recorded by the last emitted event, if any.
    pub fn last_status(&self) -> Option<MachineStatus> {
        self.last_status
    }

    /// Latest accepted sample.
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.latest.as_ref()
    }

    /// Timestamp of the latest accepted sample.
    pub fn last_seen_ms(&self) -> Option<u64> {
        self.latest.as_ref().and_then(|s| s.timestamp_ms)
    }

    /// Move the event clock forward to `ts`. Events for one machine are
    /// never stamped earlier than the one before them.
    fn stamp(&mut self, ts: u64) -> u64 {
        let at = self.last_event_ms.map_or(ts, |last| last.max(ts));
        self.last_event_ms = Some(at);
        at
    }

    /// Derived status at `now_ms`. A machine that never reported is stopped.
    pub fn status_at(&self, now_ms: u64, thresholds: &LivenessThresholds) -> MachineStatus {
        match &self.latest {
            Some(sample) => classify(sample, now_ms, thresholds),
            None => MachineStatus::Stopped,
        }
    }

    /// Classify `sample` and record any transition it causes.
    ///
    /// Events carry the sample's own timestamp, or the previous event's
    /// timestamp if a decay event already moved past it. The caller must
    /// hold this machine's lock for the whole call plus the log append.
    pub fn observe(
        &mut self,
        sample: &TelemetrySample,
        now_ms: u64,
        thresholds: &LivenessThresholds,
        track_legacy: bool,
    ) -> Observation {
        let status = classify(sample, now_ms, thresholds);
        let Some(ts) = sample.timestamp_ms else {
            return Observation::without_events(status, Outcome::Malformed);
        };

        if let Some(latest_ts) = self.last_seen_ms() {
            if ts < latest_ts {
                tracing::warn!(
                    machine = %self.key,
                    sample_ms = ts,
                    latest_ms = latest_ts,
                    "out-of-order sample ignored for transition tracking"
                );
                return Observation::without_events(status, Outcome::OutOfOrder);
            }
            if ts == latest_ts {
                tracing::debug!(machine = %self.key, sample_ms = ts, "duplicate sample");
                return Observation::without_events(status, Outcome::Duplicate);
            }
        }

        let at = self.stamp(ts);
        let mut events = Vec::new();
        match self.last_status {
            None => {
                events.push(StatusEvent::initial(
                    self.key.clone(),
                    at,
                    status,
                    sample.readings,
                ));
            }
            Some(previous) if previous != status => {
                events.push(StatusEvent::transition(
                    self.key.clone(),
                    at,
                    previous,
                    status,
                    sample.readings,
                ));
            }
            Some(_) => {}
        }

        if track_legacy {
            if let Some(was_running) = self.last_running_flag {
                if was_running != sample.plc_running {
                    events.push(StatusEvent::running_flag(
                        self.key.clone(),
                        at,
                        was_running,
                        sample.plc_running,
                        sample.readings,
                    ));
                }
            }
        }

        self.last_status = Some(status);
        self.last_running_flag = Some(sample.plc_running);
        self.latest = Some(sample.clone());

        Observation {
            status,
            events,
            outcome: Outcome::Accepted,
        }
    }

    /// Re-classify the latest sample at `now_ms`.
    ///
    /// Returns a `status` event if the derived status got worse. The event
    /// is stamped at the instant the sample crossed the threshold, so a
    /// coarse tick records the same timeline as a fine one. Ageing only
    /// ever demotes: a machine whose last sample said stopped stays stopped
    /// while that sample passes through the idle window, since only a new
    /// sample can bring it back.
    pub fn refresh(
        &mut self,
        now_ms: u64,
        thresholds: &LivenessThresholds,
    ) -> Option<StatusEvent> {
        let sample = self.latest.as_ref()?;
        let last_seen = sample.timestamp_ms?;
        let previous = self.last_status?;
        let current = classify(sample, now_ms, thresholds);
        if current <= previous {
            return None;
        }

        let after = match current {
            MachineStatus::Stopped => thresholds.stopped_after,
            _ => thresholds.idle_after,
        };
        let crossing = last_seen
            .saturating_add(after.as_millis() as u64)
            .saturating_add(1)
            .min(now_ms);
        let readings = sample.readings;

        tracing::debug!(
            machine = %self.key,
            from = previous.label(),
            to = current.label(),
            "status decayed"
        );
        self.last_status = Some(current);
        let at = self.stamp(crossing);
        Some(StatusEvent::transition(
            self.key.clone(),
            at,
            previous,
            current,
            readings,
        ))
    }
}

/// Tracks the last-known status of every machine and emits events on change.
///
/// Each machine's state sits behind its own mutex, so different machines can
/// be observed from different threads at once. The outer map is only
/// write-locked the first time a machine is seen.
#[derive(Debug)]
pub struct Detector {
    machines: RwLock<BTreeMap<MachineKey, Arc<Mutex<MachineState>>>>,
    thresholds: LivenessThresholds,
    track_legacy: bool,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(LivenessThresholds::default())
    }
}

impl Detector {
    pub fn new(thresholds: LivenessThresholds) -> Self {
        Self {
            machines: RwLock::new(BTreeMap::new()),
            thresholds,
            track_legacy: false,
        }
    }

    /// Also emit `legacy_running_flag` events when the raw device flag flips.
    pub fn with_legacy_tracking(mut self, enabled: bool) -> Self {
        self.track_legacy = enabled;
        self
    }

    pub fn thresholds(&self) -> &LivenessThresholds {
        &self.thresholds
    }

    pub fn tracks_legacy(&self) -> bool {
        self.track_legacy
    }

    /// Get or create the state for a machine.
    pub fn machine(&self, key: &MachineKey) -> Arc<Mutex<MachineState>> {
        // Fast path: check if it exists
        {
            let machines = self.machines.read();
            if let Some(state) = machines.get(key) {
                return state.clone();
            }
        }

        // Slow path: create it
        let mut machines = self.machines.write();
        machines
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(MachineState::new(key.clone()))))
            .clone()
    }

    /// Classify a sample and record any transition.
    ///
    /// Malformed samples are classified stopped and never create state.
    pub fn observe(&self, sample: &TelemetrySample, now_ms: u64) -> Observation {
        if !sample.is_well_formed() {
            tracing::warn!(machine = %sample.machine_key, "sample without timestamp");
            return Observation::without_events(MachineStatus::Stopped, Outcome::Malformed);
        }

        let state = self.machine(&sample.machine_key);
        let mut state = state.lock();
        state.observe(sample, now_ms, &self.thresholds, self.track_legacy)
    }

    /// Current status of a known machine.
    pub fn status(&self, key: &MachineKey, now_ms: u64) -> Option<MachineStatus> {
        let state = self.machines.read().get(key).cloned()?;
        let status = state.lock().status_at(now_ms, &self.thresholds);
        Some(status)
    }

    /// Current status of every known machine.
    pub fn statuses(&self, now_ms: u64) -> BTreeMap<MachineKey, MachineStatus> {
        self.states()
            .iter()
            .map(|state| {
                let state = state.lock();
                (state.key.clone(), state.status_at(now_ms, &self.thresholds))
            })
            .collect()
    }

    pub fn keys(&self) -> Vec<MachineKey> {
        self.machines.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.machines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.read().is_empty()
    }

    /// Clone the per-machine handles so callers lock one machine at a time
    /// without holding the map lock.
    pub(crate) fn states(&self) -> Vec<Arc<Mutex<MachineState>>> {
        self.machines.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plcwatch_types::{EventType, StatusType};

    fn key(brand: &str) -> MachineKey {
        MachineKey::new(brand, "x").unwrap()
    }

    fn running(brand: &str, ts: u64) -> TelemetrySample {
        TelemetrySample::builder(key(brand))
            .timestamp_ms(ts)
            .plc_running(true)
            .motor_status(1)
            .production_active(1)
            .build()
    }

    fn halted(brand: &str, ts: u64) -> TelemetrySample {
        TelemetrySample::builder(key(brand)).timestamp_ms(ts).build()
    }

    fn refresh_all(detector: &Detector, now_ms: u64) -> Vec<StatusEvent> {
        detector
            .states()
            .iter()
            .filter_map(|state| state.lock().refresh(now_ms, detector.thresholds()))
            .collect()
    }

    #[test]
    fn first_sight_emits_initial() {
        let detector = Detector::default();
        let obs = detector.observe(&running("a", 1_000), 1_000);

        assert_eq!(obs.status, MachineStatus::Running);
        assert_eq!(obs.outcome, Outcome::Accepted);
        assert_eq!(obs.events.len(), 1);
        assert_eq!(obs.events[0].status_type, StatusType::Initial);
        assert_eq!(obs.events[0].event_type, EventType::Started);
    }

    #[test]
    fn first_sight_stopped_emits_stopped_initial() {
        let detector = Detector::default();
        let obs = detector.observe(&halted("a", 1_000), 1_000);
        assert_eq!(obs.events[0].event_type, EventType::Stopped);
        assert_eq!(obs.events[0].current_status, MachineStatus::Stopped);
    }

    #[test]
    fn unchanged_status_emits_nothing() {
        let detector = Detector::default();
        detector.observe(&running("a", 1_000), 1_000);
        let obs = detector.observe(&running("a", 2_000), 2_000);
        assert!(obs.events.is_empty());
    }

    #[test]
    fn change_emits_status_event() {
        let detector = Detector::default();
        detector.observe(&running("a", 1_000), 1_000);
        let obs = detector.observe(&halted("a", 2_000), 2_000);

        assert_eq!(obs.events.len(), 1);
        let event = &obs.events[0];
        assert_eq!(event.status_type, StatusType::Status);
        assert_eq!(event.event_type, EventType::Stopped);
        assert_eq!(event.previous_status, Some(MachineStatus::Running));
        assert_eq!(event.timestamp_ms, 2_000);
    }

    #[test]
    fn running_to_idle_is_recorded() {
        let detector = Detector::default();
        detector.observe(&running("a", 1_000), 1_000);
        let idle = TelemetrySample::builder(key("a"))
            .timestamp_ms(2_000)
            .plc_running(true)
            .build();
        let obs = detector.observe(&idle, 2_000);

        assert_eq!(obs.events[0].current_status, MachineStatus::Idle);
        assert_eq!(obs.events[0].event_type, EventType::Started);
    }

    #[test]
    fn malformed_sample_is_stopped_and_untracked() {
        let detector = Detector::default();
        let sample = TelemetrySample::builder(key("a")).plc_running(true).build();
        let obs = detector.observe(&sample, 1_000);

        assert_eq!(obs.status, MachineStatus::Stopped);
        assert_eq!(obs.outcome, Outcome::Malformed);
        assert!(obs.events.is_empty());
        assert!(detector.is_empty());
    }

    #[test]
    fn out_of_order_sample_keeps_latest() {
        let detector = Detector::default();
        detector.observe(&running("a", 10_000), 10_000);
        let obs = detector.observe(&halted("a", 5_000), 10_000);

        assert_eq!(obs.outcome, Outcome::OutOfOrder);
        assert_eq!(obs.status, MachineStatus::Stopped);
        assert!(obs.events.is_empty());
        assert_eq!(
            detector.status(&key("a"), 10_000),
            Some(MachineStatus::Running)
        );
    }

    #[test]
    fn duplicate_sample_is_ignored() {
        let detector = Detector::default();
        detector.observe(&running("a", 10_000), 10_000);
        let obs = detector.observe(&halted("a", 10_000), 10_000);
        assert_eq!(obs.outcome, Outcome::Duplicate);
        assert!(obs.events.is_empty());
    }

    #[test]
    fn refresh_decays_silent_machine() {
        let detector = Detector::default();
        detector.observe(&running("a", 0), 0);

        assert!(refresh_all(&detector, 10_000).is_empty());

        let idle = refresh_all(&detector, 25_000);
        assert_eq!(idle.len(), 1);
        assert_eq!(idle[0].current_status, MachineStatus::Idle);
        assert_eq!(idle[0].event_type, EventType::Started);
        assert_eq!(idle[0].timestamp_ms, 20_001);

        let stopped = refresh_all(&detector, 31_000);
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].previous_status, Some(MachineStatus::Idle));
        assert_eq!(stopped[0].event_type, EventType::Stopped);
        assert_eq!(stopped[0].timestamp_ms, 30_001);

        assert!(refresh_all(&detector, 60_000).is_empty());
    }

    #[test]
    fn coarse_refresh_stamps_at_threshold_crossing() {
        let detector = Detector::default();
        detector.observe(&running("a", 0), 0);

        // One late tick skips the idle window entirely
        let events = refresh_all(&detector, 90_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].previous_status, Some(MachineStatus::Running));
        assert_eq!(events[0].current_status, MachineStatus::Stopped);
        assert_eq!(events[0].timestamp_ms, 30_001);
    }

    #[test]
    fn late_sample_is_never_stamped_before_decay() {
        let detector = Detector::default().with_legacy_tracking(true);
        detector.observe(&running("a", 0), 0);
        let decay = refresh_all(&detector, 30_100);
        assert_eq!(decay[0].timestamp_ms, 30_001);

        // Produced before the crossing, delivered after the tick
        let late = detector.observe(&halted("a", 25_000), 30_150);
        assert_eq!(late.outcome, Outcome::Accepted);
        assert!(late
            .events
            .iter()
            .all(|e| e.timestamp_ms >= decay[0].timestamp_ms));

        let resumed = detector.observe(&running("a", 30_500), 30_600);
        assert_eq!(resumed.events[0].event_type, EventType::Started);
        assert_eq!(resumed.events[0].timestamp_ms, 30_500);
    }

    #[test]
    fn stale_stopped_sample_is_not_revived_by_idle_window() {
        let detector = Detector::default();
        detector.observe(&halted("a", 0), 0);

        // Classifier alone says idle between 20s and 30s of age
        assert_eq!(detector.status(&key("a"), 25_000), Some(MachineStatus::Idle));
        assert!(refresh_all(&detector, 25_000).is_empty());
        assert!(refresh_all(&detector, 35_000).is_empty());
    }

    #[test]
    fn fresh_sample_after_decay_restarts() {
        let detector = Detector::default();
        detector.observe(&running("a", 0), 0);
        refresh_all(&detector, 40_000);

        let obs = detector.observe(&running("a", 41_000), 41_000);
        assert_eq!(obs.events.len(), 1);
        assert_eq!(obs.events[0].previous_status, Some(MachineStatus::Stopped));
        assert_eq!(obs.events[0].event_type, EventType::Started);
    }

    #[test]
    fn legacy_flag_events_only_when_enabled() {
        let plain = Detector::default();
        let legacy = Detector::default().with_legacy_tracking(true);

        // Motor keeps the classifier at running while the raw flag flips.
        let on = TelemetrySample::builder(key("a"))
            .timestamp_ms(1_000)
            .plc_running(true)
            .motor_status(1)
            .build();
        let off = TelemetrySample::builder(key("a"))
            .timestamp_ms(2_000)
            .plc_running(false)
            .motor_status(1)
            .build();

        for detector in [&plain, &legacy] {
            detector.observe(&on, 1_000);
        }
        assert!(plain.observe(&off, 2_000).events.is_empty());

        let obs = legacy.observe(&off, 2_000);
        assert_eq!(obs.events.len(), 1);
        assert_eq!(obs.events[0].status_type, StatusType::LegacyRunningFlag);
        assert_eq!(obs.events[0].event_type, EventType::Stopped);
    }

    #[test]
    fn status_of_unknown_machine_is_none() {
        let detector = Detector::default();
        assert_eq!(detector.status(&key("nope"), 0), None);
    }

    #[test]
    fn registered_machine_without_samples_is_stopped() {
        let detector = Detector::default();
        detector.machine(&key("a"));
        assert_eq!(detector.status(&key("a"), 0), Some(MachineStatus::Stopped));
        assert!(refresh_all(&detector, 100_000).is_empty());
    }

    #[test]
    fn machine_returns_same_arc_on_second_call() {
        let detector = Detector::default();
        let first = detector.machine(&key("a"));
        let second = detector.machine(&key("a"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn machines_are_tracked_independently() {
        let detector = Detector::default();
        detector.observe(&running("a", 1_000), 1_000);
        detector.observe(&halted("b", 1_000), 1_000);

        let statuses = detector.statuses(1_000);
        assert_eq!(statuses[&key("a")], MachineStatus::Running);
        assert_eq!(statuses[&key("b")], MachineStatus::Stopped);
    }

    #[test]
    fn concurrent_observation_is_thread_safe() {
        use std::thread;

        let detector = Arc::new(Detector::default());
        let mut handles = vec![];
        for t in 0..8u64 {
            let d = detector.clone();
            handles.push(thread::spawn(move || {
                let brand = format!("m{}", t);
                let mut emitted = 0;
                for i in 1..=100u64 {
                    let sample = if i % 2 == 0 {
                        running(&brand, i * 1_000)
                    } else {
                        halted(&brand, i * 1_000)
                    };
                    emitted += d.observe(&sample, i * 1_000).events.len();
                }
                emitted
            }));
        }

        for h in handles {
            // Initial plus 99 flips.
            assert_eq!(h.join().unwrap(), 100);
        }
        assert_eq!(detector.len(), 8);
    }
}
