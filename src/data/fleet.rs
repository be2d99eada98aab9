//! Current fleet view.
//!
//! One row per machine with its derived status, plus the counters shown
//! above the fleet table.

use std::collections::BTreeSet;
use std::time::Duration;

use plcwatch_sdk::Engine;
use plcwatch_types::{MachineKey, MachineStatus, Readings, TelemetrySample};

use crate::registry::MachineRegistry;

/// One machine as shown in the fleet table.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineData {
    pub key: MachineKey,
    pub status: MachineStatus,
    /// False for registry machines that have never reported.
    pub has_data: bool,
    pub last_seen_ms: Option<u64>,
    /// Time since the last sample. `None` without data or for future samples.
    pub age: Option<Duration>,
    pub plc_running: bool,
    pub readings: Readings,
}

impl MachineData {
    fn from_latest(
        key: MachineKey,
        latest: Option<&TelemetrySample>,
        status: MachineStatus,
        now_ms: u64,
    ) -> Self {
        let last_seen_ms = latest.and_then(|s| s.timestamp_ms);
        Self {
            key,
            status,
            has_data: latest.is_some(),
            last_seen_ms,
            age: last_seen_ms
                .and_then(|ts| now_ms.checked_sub(ts))
                .map(Duration::from_millis),
            plc_running: latest.map_or(false, |s| s.plc_running),
            readings: latest.map(|s| s.readings).unwrap_or_default(),
        }
    }

    fn without_data(key: MachineKey) -> Self {
        Self {
            key,
            status: MachineStatus::Stopped,
            has_data: false,
            last_seen_ms: None,
            age: None,
            plc_running: false,
            readings: Readings::default(),
        }
    }
}

/// The fleet table: most recently seen first, silent registry machines last.
#[derive(Debug, Clone, Default)]
pub struct FleetData {
    pub machines: Vec<MachineData>,
    pub now_ms: u64,
}

impl FleetData {
    /// Build the view from the engine's live state.
    pub fn build(engine: &Engine, now_ms: u64, registry: &dyn MachineRegistry) -> Self {
        let thresholds = engine.detector().thresholds();
        let machines = engine
            .detector()
            .keys()
            .into_iter()
            .map(|key| {
                let state = engine.detector().machine(&key);
                let state = state.lock();
                MachineData::from_latest(
                    key,
                    state.latest(),
                    state.status_at(now_ms, thresholds),
                    now_ms,
                )
            })
            .collect();
        Self::assemble(machines, now_ms, registry)
    }

    fn assemble(
        mut machines: Vec<MachineData>,
        now_ms: u64,
        registry: &dyn MachineRegistry,
    ) -> Self {
        machines.sort_by(|a, b| {
            b.last_seen_ms
                .cmp(&a.last_seen_ms)
                .then_with(|| a.key.cmp(&b.key))
        });

        let seen: Vec<MachineKey> = machines.iter().map(|m| m.key.clone()).collect();
        machines.extend(
            registry
                .missing_from(&seen)
                .into_iter()
                .map(MachineData::without_data),
        );

        Self { machines, now_ms }
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Rows whose key or brand matches `filter`.
    pub fn filtered<'a>(&'a self, filter: &'a str) -> impl Iterator<Item = &'a MachineData> + 'a {
        self.machines.iter().filter(move |m| m.key.matches(filter))
    }

    pub fn summary(&self) -> FleetSummary {
        FleetSummary::from_machines(&self.machines)
    }
}

/// Counters for the top of the fleet view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetSummary {
    pub total_machines: usize,
    pub running: usize,
    pub idle: usize,
    pub stopped: usize,
    pub total_production: u64,
    pub avg_temperature: f64,
    pub avg_pressure: f64,
    pub avg_rpm: f64,
    pub brands: BTreeSet<String>,
}

impl FleetSummary {
    /// Averages are taken over every row, silent registry machines included.
    pub fn from_machines(machines: &[MachineData]) -> Self {
        let count = |status| machines.iter().filter(|m| m.status == status).count();
        let mean = |f: fn(&Readings) -> f64| {
            if machines.is_empty() {
                0.0
            } else {
                machines.iter().map(|m| f(&m.readings)).sum::<f64>() / machines.len() as f64
            }
        };

        Self {
            total_machines: machines.len(),
            running: count(MachineStatus::Running),
            idle: count(MachineStatus::Idle),
            stopped: count(MachineStatus::Stopped),
            total_production: machines.iter().map(|m| m.readings.production_count).sum(),
            avg_temperature: mean(|r| r.temperature),
            avg_pressure: mean(|r| r.pressure),
            avg_rpm: mean(|r| r.rpm),
            brands: machines.iter().map(|m| m.key.brand().to_string()).collect(),
        }
    }
}
