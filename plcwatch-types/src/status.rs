//! Derived machine status.

use core::fmt;

/// Operating status of a machine, derived from sample freshness and content.
///
/// Ordered from least to most severe so the worst status of a group can be
/// taken with `max()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(index_only))]
pub enum MachineStatus {
    #[cfg_attr(feature = "minicbor", n(0))]
    Running,
    #[cfg_attr(feature = "minicbor", n(1))]
    Idle,
    #[cfg_attr(feature = "minicbor", n(2))]
    Stopped,
}

impl MachineStatus {
    /// Lower-case label as used in status logs.
    pub fn label(&self) -> &'static str {
        match self {
            MachineStatus::Running => "running",
            MachineStatus::Idle => "idle",
            MachineStatus::Stopped => "stopped",
        }
    }

    /// Parse a status label, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        [MachineStatus::Running, MachineStatus::Idle, MachineStatus::Stopped]
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label))
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, MachineStatus::Stopped)
    }

    /// Short symbol for terminal display.
    pub fn symbol(&self) -> &'static str {
        match self {
            MachineStatus::Running => "RUN",
            MachineStatus::Idle => "IDLE",
            MachineStatus::Stopped => "STOP",
        }
    }
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
