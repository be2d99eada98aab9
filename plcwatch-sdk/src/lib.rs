//! # plcwatch-sdk
//!
//! Liveness engine for PLC telemetry.
//!
//! PLCs never report "I am down". They send periodic samples, and a machine
//! whose feed goes quiet has to be inferred stopped from the age of its last
//! sample. This crate turns that stream into:
//!
//! - a current [`MachineStatus`] per machine ([`classify`], [`Detector`]),
//! - an append-only log of [`StatusEvent`]s ([`EventLog`]),
//! - well-formed [`StoppageInterval`]s re-derived from that log ([`reconstruct`]),
//! - fleet downtime counters ([`summarize`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plcwatch_sdk::{current_timestamp_ms, Engine, MachineKey, Output, TelemetrySample};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::builder()
//!         .output(Output::file("fleet.json"))
//!         .interval(Duration::from_secs(1))
//!         .build();
//!
//!     let press = engine.register(MachineKey::new("siemens", "s7-1200").unwrap());
//!
//!     let sample = TelemetrySample::builder(press.key().clone())
//!         .timestamp_ms(current_timestamp_ms())
//!         .plc_running(true)
//!         .motor_status(1)
//!         .build();
//!     press.apply(&sample, current_timestamp_ms());
//!
//!     // Re-classify every second so dead feeds decay to idle, then stopped
//!     let emission = engine.start();
//!
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     emission.stop();
//! }
//! ```
//!
//! ## Features
//!
//! - **Pure classification**: status is a function of the sample and `now`
//! - **Per-machine locking**: different machines ingest in parallel
//! - **Idempotent reconstruction**: the same log and `now` give the same intervals
//! - **Background ticking**: periodic snapshots to file, TCP or channel outputs

mod classifier;
mod detector;
mod engine;
mod handle;
mod log;
mod output;
mod reconstruct;
mod summary;

pub use classifier::{classify, classify_flags, LivenessThresholds, IDLE_AFTER, STOPPED_AFTER};
pub use detector::{Detector, MachineState, Observation, Outcome};
pub use engine::{Engine, EngineBuilder, ReplayStats};
pub use handle::MachineHandle;
pub use log::{EventLog, Window};
pub use output::Output;
pub use reconstruct::reconstruct;
pub use summary::{summarize, StoppageSummary};

#[cfg(feature = "tokio")]
pub use engine::EmissionHandle;

// Re-export types for convenience
pub use plcwatch_types::{
    current_timestamp_ms, format_duration, EventType, FleetSnapshot, MachineKey, MachineReading,
    MachineStatus, Readings, StatusEvent, StatusType, StoppageInterval, TelemetrySample,
};
