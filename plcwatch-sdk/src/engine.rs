//! The Engine: entry point tying detector, event log and outputs together.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use plcwatch_types::{
    FleetSnapshot, MachineKey, MachineReading, MachineStatus, StatusEvent, StoppageInterval,
    TelemetrySample,
};

use crate::classifier::LivenessThresholds;
use crate::detector::{Detector, Observation, Outcome};
use crate::handle::MachineHandle;
use crate::log::{EventLog, Window};
use crate::output::Output;
use crate::reconstruct::reconstruct;

/// Counters from a bulk replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayStats {
    pub accepted: usize,
    pub malformed: usize,
    pub out_of_order: usize,
    pub duplicates: usize,
    /// Events appended to the log, decays included.
    pub events: usize,
}

/// The main entry point for liveness tracking.
///
/// An Engine owns the transition detector and the event log. Samples go in
/// through [`MachineHandle::apply`], [`Engine::ingest`] or [`Engine::replay`];
/// statuses, snapshots and stoppage intervals come out. Live push messages
/// and bulk historical queries go through the same detector.
///
/// # Example
///
/// ```rust
/// use plcwatch_sdk::{Engine, MachineKey, MachineStatus, TelemetrySample, Window};
///
/// let engine = Engine::new();
/// let key = MachineKey::new("siemens", "s7").unwrap();
///
/// let samples = vec![
///     TelemetrySample::builder(key.clone())
///         .timestamp_ms(0)
///         .plc_running(true)
///         .motor_status(1)
///         .build(),
///     TelemetrySample::builder(key.clone())
///         .timestamp_ms(90_000)
///         .plc_running(true)
///         .motor_status(1)
///         .build(),
/// ];
/// engine.replay(samples, 100_000);
///
/// // The feed was silent for 90s, so the machine was stopped in between
/// let stoppages = engine.stoppages(Window::all(), 100_000);
/// assert_eq!(stoppages.len(), 1);
/// assert_eq!(stoppages[0].start_ms, 30_001);
/// assert_eq!(engine.status(&key, 100_000), Some(MachineStatus::Running));
/// ```
#[derive(Debug)]
pub struct Engine {
    detector: Arc<Detector>,
    log: Arc<EventLog>,
    outputs: Arc<Vec<Output>>,
    interval: Duration,
}

impl Engine {
    /// Create an engine with default thresholds, no outputs and a 1s tick.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Register a machine and get a handle for feeding its samples.
    ///
    /// Registering an already known machine returns a handle to the existing
    /// state. A registered machine without samples shows up as stopped.
    pub fn register(&self, key: MachineKey) -> MachineHandle {
        MachineHandle {
            state: self.detector.machine(&key),
            detector: self.detector.clone(),
            log: self.log.clone(),
            key,
        }
    }

    /// Ingest one sample, classifying it against the wall clock.
    pub fn ingest(&self, sample: &TelemetrySample) -> Observation {
        self.ingest_at(sample, plcwatch_types::current_timestamp_ms())
    }

    /// Ingest one sample, classifying it at `now_ms`.
    pub fn ingest_at(&self, sample: &TelemetrySample, now_ms: u64) -> Observation {
        if !sample.is_well_formed() {
            return self.detector.observe(sample, now_ms);
        }
        self.register(sample.machine_key.clone()).apply(sample, now_ms)
    }

    /// Feed a batch of historical samples through the detector.
    ///
    /// Each machine's samples are applied in timestamp order, each classified
    /// at its own timestamp. Between two samples the machine is re-classified
    /// at the instants it would have crossed the idle and stopped thresholds,
    /// so a silent gap in the history produces the same decay events the live
    /// tick would have logged. The tail is decayed up to `now_ms`.
    pub fn replay(
        &self,
        samples: impl IntoIterator<Item = TelemetrySample>,
        now_ms: u64,
    ) -> ReplayStats {
        let mut stats = ReplayStats::default();
        let mut by_machine: BTreeMap<MachineKey, Vec<TelemetrySample>> = BTreeMap::new();
        for sample in samples {
            if sample.is_well_formed() {
                by_machine
                    .entry(sample.machine_key.clone())
                    .or_default()
                    .push(sample);
            } else {
                tracing::warn!(machine = %sample.machine_key, "skipping sample without timestamp");
                stats.malformed += 1;
            }
        }

        let thresholds = *self.detector.thresholds();
        for (key, mut samples) in by_machine {
            samples.sort_by_key(|s| s.timestamp_ms);
            let handle = self.register(key);
            let mut previous = handle.last_seen_ms();

            for sample in &samples {
                let ts = sample.timestamp_ms.unwrap_or_default();
                if let Some(prev) = previous {
                    stats.events += decay_between(&handle, &thresholds, prev, ts);
                }
                let observation = handle.apply(sample, ts);
                stats.events += observation.events.len();
                match observation.outcome {
                    Outcome::Accepted => {
                        stats.accepted += 1;
                        previous = Some(ts);
                    }
                    Outcome::OutOfOrder => stats.out_of_order += 1,
                    Outcome::Duplicate => stats.duplicates += 1,
                    Outcome::Malformed => stats.malformed += 1,
                }
            }

            if let Some(prev) = previous {
                stats.events += decay_between(&handle, &thresholds, prev, now_ms.saturating_add(1));
            }
        }

        tracing::info!(
            accepted = stats.accepted,
            malformed = stats.malformed,
            out_of_order = stats.out_of_order,
            events = stats.events,
            "replay complete"
        );
        stats
    }

    /// Re-classify every machine at `now_ms` and log the decays.
    ///
    /// This is what the background task runs on every tick; call it yourself
    /// when driving the engine from your own clock.
    pub fn tick(&self, now_ms: u64) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        for state in self.detector.states() {
            let mut state = state.lock();
            if let Some(event) = state.refresh(now_ms, self.detector.thresholds()) {
                self.log.append(event.clone());
                events.push(event);
            }
        }
        events
    }

    /// Collect a snapshot of every machine's status at `now_ms`.
    pub fn collect(&self, now_ms: u64) -> FleetSnapshot {
        let mut snapshot = FleetSnapshot::with_timestamp(now_ms);
        for state in self.detector.states() {
            let state = state.lock();
            let latest = state.latest();
            let reading = MachineReading {
                status: state.status_at(now_ms, self.detector.thresholds()),
                last_seen_ms: state.last_seen_ms(),
                plc_running: latest.map_or(false, |s| s.plc_running),
                readings: latest.map(|s| s.readings).unwrap_or_default(),
            };
            snapshot.insert(state.key(), reading);
        }
        snapshot
    }

    /// Stoppage intervals overlapping `window`, newest first.
    ///
    /// The whole log is reconstructed so that a stoppage which began before
    /// the window is still reported with its true start.
    pub fn stoppages(&self, window: Window, now_ms: u64) -> Vec<StoppageInterval> {
        let events = self.log.snapshot(Window::new(0, window.to_ms));
        let mut intervals = reconstruct(&events, now_ms);
        intervals.retain(|i| i.overlaps(window.from_ms, window.to_ms.saturating_add(1)));
        intervals
    }

    /// Current status of a known machine.
    pub fn status(&self, key: &MachineKey, now_ms: u64) -> Option<MachineStatus> {
        self.detector.status(key, now_ms)
    }

    /// Current status of every known machine.
    pub fn statuses(&self, now_ms: u64) -> BTreeMap<MachineKey, MachineStatus> {
        self.detector.statuses(now_ms)
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Start background ticking.
    ///
    /// This spawns a tokio task that, on every interval, re-classifies all
    /// machines against the wall clock and emits a [`FleetSnapshot`] to all
    /// configured outputs.
    ///
    /// Returns a handle that can be used to stop the task.
    #[cfg(feature = "tokio")]
    pub fn start(&self) -> EmissionHandle {
        use tokio::sync::watch;

        let (stop_tx, stop_rx) = watch::channel(false);
        let engine = Engine {
            detector: self.detector.clone(),
            log: self.log.clone(),
            outputs: self.outputs.clone(),
            interval: self.interval,
        };

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(engine.interval);
            let mut stop_rx = stop_rx;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        engine.emit_now().await;
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        EmissionHandle { stop_tx }
    }

    /// Tick and emit a snapshot to all outputs immediately.
    #[cfg(feature = "tokio")]
    pub async fn emit_now(&self) {
        let now = plcwatch_types::current_timestamp_ms();
        self.tick(now);
        let snapshot = self.collect(now);
        for output in self.outputs.iter() {
            if let Err(e) = output.emit(&snapshot).await {
                tracing::warn!(error = %e, "failed to emit fleet snapshot");
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-classify at the threshold crossings strictly between `from_ms` and `until_ms`.
fn decay_between(
    handle: &MachineHandle,
    thresholds: &LivenessThresholds,
    from_ms: u64,
    until_ms: u64,
) -> usize {
    [thresholds.idle_after, thresholds.stopped_after]
        .iter()
        .map(|after| from_ms + after.as_millis() as u64 + 1)
        .filter(|crossing| *crossing < until_ms)
        .filter(|crossing| handle.refresh(*crossing).is_some())
        .count()
}

/// Builder for configuring an Engine.
#[derive(Debug, Default)]
pub struct EngineBuilder {
    outputs: Vec<Output>,
    interval: Option<Duration>,
    thresholds: Option<LivenessThresholds>,
    legacy_tracking: bool,
}

impl EngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; snapshots will be emitted to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the tick interval. Defaults to 1 second.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Override the idle/stopped staleness thresholds.
    pub fn thresholds(mut self, thresholds: LivenessThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// Also log `legacy_running_flag` events from the raw device flag.
    pub fn legacy_tracking(mut self, enabled: bool) -> Self {
        self.legacy_tracking = enabled;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Engine {
        let detector = Detector::new(self.thresholds.unwrap_or_default())
            .with_legacy_tracking(self.legacy_tracking);
        Engine {
            detector: Arc::new(detector),
            log: Arc::new(EventLog::new()),
            outputs: Arc::new(self.outputs),
            interval: self.interval.unwrap_or(Duration::from_secs(1)),
        }
    }
}

/// Handle for controlling background ticking.
///
/// Call `stop()` to end the task.
#[cfg(feature = "tokio")]
pub struct EmissionHandle {
    stop_tx: tokio::sync::watch::Sender<bool>,
}

#[cfg(feature = "tokio")]
impl EmissionHandle {
    /// Stop background ticking.
    pub fn stop(self) {
        let _ = self.stop_tx.send(true);
    }
}
