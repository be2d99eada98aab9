//! Fleet snapshot - a point-in-time view of every machine's derived status.

use alloc::collections::BTreeMap;
use alloc::string::String;

use crate::{MachineKey, MachineStatus, Readings, SchemaVersion};

/// Live view of one machine inside a [`FleetSnapshot`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct MachineReading {
    /// Status derived at the snapshot's timestamp.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub status: MachineStatus,

    /// Timestamp of the latest accepted sample.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "minicbor", n(1))]
    pub last_seen_ms: Option<u64>,

    /// Raw device running flag from the latest sample.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub plc_running: bool,

    #[cfg_attr(feature = "minicbor", n(3))]
    pub readings: Readings,
}

/// A point-in-time snapshot of fleet liveness.
///
/// Snapshots are emitted on every tick of the live path, so a machine whose
/// feed died shows up as idle and then stopped even though no new sample
/// arrived.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct FleetSnapshot {
    /// Schema version for forward compatibility.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub version: SchemaVersion,

    /// Unix timestamp in milliseconds the statuses were derived at.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    /// Per-machine view, keyed by the joined machine key.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub machines: BTreeMap<String, MachineReading>,
}

impl FleetSnapshot {
    /// Create an empty snapshot for the given instant.
    pub fn with_timestamp(timestamp_ms: u64) -> Self {
        Self {
            version: SchemaVersion::current(),
            timestamp_ms,
            machines: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, key: &MachineKey, reading: MachineReading) {
        self.machines.insert(key.as_string(), reading);
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn get(&self, key: &MachineKey) -> Option<&MachineReading> {
        self.machines.get(&key.as_string())
    }

    /// Number of machines currently in `status`.
    pub fn count(&self, status: MachineStatus) -> usize {
        self.machines.values().filter(|m| m.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(status: MachineStatus) -> MachineReading {
        MachineReading {
            status,
            last_seen_ms: Some(1_000),
            plc_running: status == MachineStatus::Running,
            readings: Readings::default(),
        }
    }

    #[test]
    fn counts_by_status() {
        let mut snapshot = FleetSnapshot::with_timestamp(5_000);
        snapshot.insert(&MachineKey::new("a", "1").unwrap(), reading(MachineStatus::Running));
        snapshot.insert(&MachineKey::new("b", "1").unwrap(), reading(MachineStatus::Stopped));
        snapshot.insert(&MachineKey::new("c", "1").unwrap(), reading(MachineStatus::Stopped));

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.count(MachineStatus::Running), 1);
        assert_eq!(snapshot.count(MachineStatus::Idle), 0);
        assert_eq!(snapshot.count(MachineStatus::Stopped), 2);
        assert!(snapshot.version.is_compatible());
    }

    #[test]
    fn lookup_uses_normalized_key() {
        let mut snapshot = FleetSnapshot::with_timestamp(0);
        snapshot.insert(&MachineKey::new("Delta", "DVP").unwrap(), reading(MachineStatus::Idle));
        let probe = MachineKey::new(" delta ", "dvp").unwrap();
        assert_eq!(snapshot.get(&probe).map(|m| m.status), Some(MachineStatus::Idle));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let mut snapshot = FleetSnapshot::with_timestamp(1703160000000);
        snapshot.insert(&MachineKey::new("a", "1").unwrap(), reading(MachineStatus::Running));

        let json = serde_json::to_string(&snapshot).unwrap();
        let parsed: FleetSnapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(snapshot, parsed);
    }
}
