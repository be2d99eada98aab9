//! Reconstructed stoppage intervals.

use crate::{format_duration, MachineKey, Readings};
use alloc::string::String;

/// A span of time during which a machine was stopped.
///
/// Intervals are never stored as source of truth. They are re-derived from
/// the status event log for a window, so two reconstructions of the same log
/// at the same `now` produce equal intervals.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct StoppageInterval {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub machine_key: MachineKey,

    /// Unix timestamp in milliseconds when the stoppage began.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub start_ms: u64,

    /// Unix timestamp in milliseconds when the machine started again.
    /// `None` while the stoppage is ongoing.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub end_ms: Option<u64>,

    /// Length in whole seconds. Never negative; for ongoing stoppages this is
    /// measured up to the reconstruction's `now`.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub duration_seconds: u64,

    #[cfg_attr(feature = "minicbor", n(4))]
    pub is_ongoing: bool,

    /// Set when the raw end preceded the start (device/server clock skew) and
    /// the duration was taken as an absolute value.
    #[cfg_attr(feature = "serde", serde(default))]
    #[cfg_attr(feature = "minicbor", n(5))]
    pub clock_skew: bool,

    /// Readings captured by the event that opened the stoppage.
    #[cfg_attr(feature = "minicbor", n(6))]
    pub readings: Readings,
}

impl StoppageInterval {
    /// Human-readable duration, e.g. `"1h 2m"`.
    pub fn duration_display(&self) -> String {
        format_duration(self.duration_seconds as i64)
    }

    /// Returns true if the interval overlaps `[from_ms, to_ms)`.
    ///
    /// Ongoing intervals extend to infinity.
    pub fn overlaps(&self, from_ms: u64, to_ms: u64) -> bool {
        let ends_after_from = self.end_ms.map_or(true, |end| end > from_ms);
        self.start_ms < to_ms && ends_after_from
    }
}
