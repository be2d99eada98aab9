//! Telemetry samples reported by PLCs.

use crate::MachineKey;

/// Process readings carried by a sample and copied onto events and intervals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct Readings {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub temperature: f64,

    #[cfg_attr(feature = "minicbor", n(1))]
    pub pressure: f64,

    #[cfg_attr(feature = "minicbor", n(2))]
    pub rpm: f64,

    /// Monotonic production counter.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub production_count: u64,
}

/// One periodic snapshot of a machine's state.
///
/// Samples are ephemeral: they are classified when they arrive and only the
/// resulting transitions are kept. Nothing in a sample says "the machine is
/// down"; liveness is inferred from how fresh the sample is.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct TelemetrySample {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub machine_key: MachineKey,

    /// Unix timestamp in milliseconds when the PLC took the sample.
    ///
    /// `None` marks a malformed sample; it always classifies as stopped.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "minicbor", n(1))]
    pub timestamp_ms: Option<u64>,

    /// Raw running flag reported by the device.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub plc_running: bool,

    /// Motor state, 0 or 1.
    #[cfg_attr(feature = "minicbor", n(3))]
    pub motor_status: u8,

    /// Production line state, 0 or 1.
    #[cfg_attr(feature = "minicbor", n(4))]
    pub production_active: u8,

    #[cfg_attr(feature = "minicbor", n(5))]
    pub readings: Readings,

    /// When the upstream collector last saw the machine stop, if it tracks that.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    #[cfg_attr(feature = "minicbor", n(6))]
    pub stopped_at_ms: Option<u64>,
}

impl TelemetrySample {
    /// Create a builder for a sample from the given machine.
    pub fn builder(machine_key: MachineKey) -> TelemetrySampleBuilder {
        TelemetrySampleBuilder::new(machine_key)
    }

    /// Returns true if the sample can take part in transition tracking.
    pub fn is_well_formed(&self) -> bool {
        self.timestamp_ms.is_some()
    }

    pub fn motor_on(&self) -> bool {
        self.motor_status == 1
    }

    pub fn production_on(&self) -> bool {
        self.production_active == 1
    }
}

/// Builder for [`TelemetrySample`].
#[derive(Debug)]
pub struct TelemetrySampleBuilder {
    sample: TelemetrySample,
}

impl TelemetrySampleBuilder {
    pub fn new(machine_key: MachineKey) -> Self {
        Self {
            sample: TelemetrySample {
                machine_key,
                timestamp_ms: None,
                plc_running: false,
                motor_status: 0,
                production_active: 0,
                readings: Readings::default(),
                stopped_at_ms: None,
            },
        }
    }

    pub fn timestamp_ms(mut self, ts: u64) -> Self {
        self.sample.timestamp_ms = Some(ts);
        self
    }

    pub fn plc_running(mut self, running: bool) -> Self {
        self.sample.plc_running = running;
        self
    }

    pub fn motor_status(mut self, status: u8) -> Self {
        self.sample.motor_status = status;
        self
    }

    pub fn production_active(mut self, active: u8) -> Self {
        self.sample.production_active = active;
        self
    }

    pub fn readings(mut self, readings: Readings) -> Self {
        self.sample.readings = readings;
        self
    }

    pub fn stopped_at_ms(mut self, ts: u64) -> Self {
        self.sample.stopped_at_ms = Some(ts);
        self
    }

    pub fn build(self) -> TelemetrySample {
        self.sample
    }
}
