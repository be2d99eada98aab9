//! # plcwatch-types
//!
//! Core types for PLC liveness tracking. This crate defines the shared data
//! model used by every layer of plcwatch: raw telemetry samples, derived
//! machine status, the append-only status event shape, and reconstructed
//! stoppage intervals.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable `serde` and/or `minicbor` features as needed
//! - **One identity**: [`MachineKey`] is normalized once at construction, so every
//!   layer groups samples, events and intervals by the same key
//! - **Derived status only**: [`MachineStatus`] is always computed, never stored
//!   as authoritative state
//!
//! ## Features
//!
//! - `std` (default): Standard library support
//! - `serde`: JSON/MessagePack/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use plcwatch_types::{format_duration, MachineKey, TelemetrySample};
//!
//! let key = MachineKey::new("  Siemens ", "S7-1200").unwrap();
//! assert_eq!(key.as_string(), "siemens_s7-1200");
//!
//! let sample = TelemetrySample::builder(key)
//!     .timestamp_ms(1_700_000_000_000)
//!     .plc_running(true)
//!     .motor_status(1)
//!     .build();
//! assert!(sample.plc_running);
//!
//! assert_eq!(format_duration(3725), "1h 2m");
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod duration;
mod event;
mod interval;
mod key;
mod sample;
mod snapshot;
mod status;
mod version;

pub use duration::*;
pub use event::*;
pub use interval::*;
pub use key::*;
pub use sample::*;
pub use snapshot::*;
pub use status::*;
pub use version::*;

/// Current schema version.
///
/// Increment this when making breaking changes to the fleet snapshot format.
pub const SCHEMA_VERSION: u32 = 1;
