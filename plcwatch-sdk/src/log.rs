//! Append-only status event log.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use plcwatch_types::{MachineKey, StatusEvent};

/// Inclusive time bounds for reading the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from_ms: u64,
    pub to_ms: u64,
}

impl Window {
    pub fn new(from_ms: u64, to_ms: u64) -> Self {
        Self { from_ms, to_ms }
    }

    /// Everything ever logged.
    pub fn all() -> Self {
        Self::new(0, u64::MAX)
    }

    /// Everything from `from_ms` onwards.
    pub fn since(from_ms: u64) -> Self {
        Self::new(from_ms, u64::MAX)
    }

    pub fn contains(&self, ts_ms: u64) -> bool {
        self.from_ms <= ts_ms && ts_ms <= self.to_ms
    }
}

type MachineLog = Arc<RwLock<Vec<StatusEvent>>>;

/// Per-machine, append-only record of status events.
///
/// There is no way to edit or remove an event once appended. Readers always
/// get clones, so reconstruction runs over an immutable snapshot.
#[derive(Debug, Default)]
pub struct EventLog {
    machines: RwLock<BTreeMap<MachineKey, MachineLog>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn machine_log(&self, key: &MachineKey) -> MachineLog {
        // Fast path
        {
            let machines = self.machines.read();
            if let Some(log) = machines.get(key) {
                return log.clone();
            }
        }

        // Slow path
        let mut machines = self.machines.write();
        machines.entry(key.clone()).or_default().clone()
    }

    /// Append one event to its machine's log.
    pub fn append(&self, event: StatusEvent) {
        let log = self.machine_log(&event.machine_key);
        log.write().push(event);
    }

    /// Append events in order.
    pub fn extend(&self, events: impl IntoIterator<Item = StatusEvent>) {
        for event in events {
            self.append(event);
        }
    }

    /// All events for one machine, in append order.
    pub fn events_for(&self, key: &MachineKey) -> Vec<StatusEvent> {
        let log = self.machines.read().get(key).cloned();
        log.map(|log| log.read().clone()).unwrap_or_default()
    }

    /// Clone every event inside `window`, grouped by machine in key order.
    pub fn snapshot(&self, window: Window) -> Vec<StatusEvent> {
        let logs: Vec<MachineLog> = self.machines.read().values().cloned().collect();
        logs.iter()
            .flat_map(|log| {
                log.read()
                    .iter()
                    .filter(|e| window.contains(e.timestamp_ms))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Machines with at least one logged event.
    pub fn keys(&self) -> Vec<MachineKey> {
        self.machines
            .read()
            .iter()
            .filter(|(_, log)| !log.read().is_empty())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Total number of events across all machines.
    pub fn len(&self) -> usize {
        self.machines.read().values().map(|log| log.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
