//! Status events: the immutable record of liveness transitions.

use crate::{MachineKey, MachineStatus, Readings};

/// Direction of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum EventType {
    #[cfg_attr(feature = "minicbor", n(0))]
    Started,
    #[cfg_attr(feature = "minicbor", n(1))]
    Stopped,
}

impl EventType {
    pub fn label(&self) -> &'static str {
        match self {
            EventType::Started => "started",
            EventType::Stopped => "stopped",
        }
    }

    /// The event type describing a move into `status`.
    pub fn entering(status: MachineStatus) -> Self {
        if status.is_stopped() {
            EventType::Stopped
        } else {
            EventType::Started
        }
    }
}

/// Provenance of a status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum StatusType {
    /// First observation of a machine.
    #[cfg_attr(feature = "minicbor", n(0))]
    Initial,
    /// Change of the freshness-based classification.
    #[cfg_attr(feature = "minicbor", n(1))]
    Status,
    /// Change of the raw `plc_running` flag reported by the device.
    #[cfg_attr(feature = "minicbor", n(2))]
    LegacyRunningFlag,
}

impl StatusType {
    pub fn label(&self) -> &'static str {
        match self {
            StatusType::Initial => "initial",
            StatusType::Status => "status",
            StatusType::LegacyRunningFlag => "legacy_running_flag",
        }
    }
}

/// One logged transition.
///
/// Events are append-only. Once created they are never edited; stoppage
/// intervals are always re-derived from them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct StatusEvent {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub machine_key: MachineKey,

    /// Unix timestamp in milliseconds of the transition.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: u64,

    #[cfg_attr(feature = "minicbor", n(2))]
    pub event_type: EventType,

    #[cfg_attr(feature = "minicbor", n(3))]
    pub status_type: StatusType,

    /// Status before the transition. `None` when unknown (first sight).
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(4))]
    pub previous_status: Option<MachineStatus>,

    #[cfg_attr(feature = "minicbor", n(5))]
    pub current_status: MachineStatus,

    /// Readings at the moment of the transition.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(6))]
    pub readings: Readings,
}

impl StatusEvent {
    /// Event for the first observation of a machine.
    pub fn initial(
        machine_key: MachineKey,
        timestamp_ms: u64,
        status: MachineStatus,
        readings: Readings,
    ) -> Self {
        Self {
            machine_key,
            timestamp_ms,
            event_type: EventType::entering(status),
            status_type: StatusType::Initial,
            previous_status: None,
            current_status: status,
            readings,
        }
    }

    /// Event for a change of the derived status.
    pub fn transition(
        machine_key: MachineKey,
        timestamp_ms: u64,
        previous: MachineStatus,
        current: MachineStatus,
        readings: Readings,
    ) -> Self {
        Self {
            machine_key,
            timestamp_ms,
            event_type: EventType::entering(current),
            status_type: StatusType::Status,
            previous_status: Some(previous),
            current_status: current,
            readings,
        }
    }

    /// Event for a change of the raw device running flag.
    pub fn running_flag(
        machine_key: MachineKey,
        timestamp_ms: u64,
        was_running: bool,
        running: bool,
        readings: Readings,
    ) -> Self {
        let as_status = |flag: bool| {
            if flag {
                MachineStatus::Running
            } else {
                MachineStatus::Stopped
            }
        };
        Self {
            machine_key,
            timestamp_ms,
            event_type: EventType::entering(as_status(running)),
            status_type: StatusType::LegacyRunningFlag,
            previous_status: Some(as_status(was_running)),
            current_status: as_status(running),
            readings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> MachineKey {
        MachineKey::new("delta", "dvp").unwrap()
    }

    #[test]
    fn initial_event_direction_follows_status() {
        let up = StatusEvent::initial(key(), 1, MachineStatus::Idle, Readings::default());
        assert_eq!(up.event_type, EventType::Started);
        assert_eq!(up.previous_status, None);

        let down = StatusEvent::initial(key(), 1, MachineStatus::Stopped, Readings::default());
        assert_eq!(down.event_type, EventType::Stopped);
        assert_eq!(down.status_type, StatusType::Initial);
    }

    #[test]
    fn transition_records_both_sides() {
        let event = StatusEvent::transition(
            key(),
            10,
            MachineStatus::Running,
            MachineStatus::Stopped,
            Readings::default(),
        );
        assert_eq!(event.event_type, EventType::Stopped);
        assert_eq!(event.previous_status, Some(MachineStatus::Running));
        assert_eq!(event.current_status, MachineStatus::Stopped);
    }

    #[test]
    fn running_flag_maps_to_running_or_stopped() {
        let event = StatusEvent::running_flag(key(), 5, false, true, Readings::default());
        assert_eq!(event.status_type, StatusType::LegacyRunningFlag);
        assert_eq!(event.event_type, EventType::Started);
        assert_eq!(event.previous_status, Some(MachineStatus::Stopped));
        assert_eq!(event.current_status, MachineStatus::Running);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_uses_log_labels() {
        let event = StatusEvent::running_flag(key(), 5, true, false, Readings::default());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "stopped");
        assert_eq!(json["status_type"], "legacy_running_flag");
        assert_eq!(json["machine_key"]["brand"], "delta");
        assert_eq!(json["machine_key"]["model"], "dvp");

        let back: StatusEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
