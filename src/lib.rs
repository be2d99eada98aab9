//! # plcwatch
//!
//! Machine liveness and stoppage history for PLC telemetry feeds.
//!
//! PLCs send periodic samples and never an explicit "down" message. This
//! crate reads those samples from a file, a channel or a network stream,
//! feeds them to the [`plcwatch_sdk`] engine, and answers three questions:
//! which machines are running right now, when did each one stop, and how
//! much downtime has the fleet had.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  ┌─────────┐    ┌──────────────┐    ┌──────────────────────┐ │
//! │  │ source  │───▶│    app       │───▶│ data                 │ │
//! │  │ (input) │    │ (Engine,     │    │ (FleetData,          │ │
//! │  └─────────┘    │  registry)   │    │  StoppageReport)     │ │
//! │       ▲         └──────────────┘    └──────────────────────┘ │
//! │       │                ▲                                      │
//! │  FileSource |          │                                      │
//! │  StreamSource |     config (Settings, PLCWATCH_* env)         │
//! │  ChannelSource                                                │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: the [`SampleSource`] trait, its implementations, and
//!   wire decoding at the boundary
//! - **[`data`]**: the fleet view and paginated stoppage history
//! - **[`registry`]**: machines known to exist even when silent
//! - **[`config`]**: thresholds, tick interval and registry from file and env
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Current status and today's stoppages from a bulk export
//! plcwatch --file telemetry.json
//!
//! # Weekly history of one brand from stored status logs
//! plcwatch --status-logs status_logs.json --period weekly --machine siemens
//!
//! # Follow a collector over TCP
//! plcwatch --connect localhost:9090 --watch
//! ```
//!
//! ### As a library with file source
//!
//! ```
//! use plcwatch::{App, FileSource, Settings};
//!
//! let source = FileSource::new("telemetry.json");
//! let app = App::new(Some(Box::new(source)), Settings::default(), Vec::new()).unwrap();
//! ```
//!
//! ### As a library with channel source
//!
//! ```
//! use plcwatch::{App, ChannelSource, MachineKey, Settings, StoppageQuery, TelemetrySample};
//!
//! let (tx, source) = ChannelSource::create("gateway");
//! let mut app = App::new(Some(Box::new(source)), Settings::default(), Vec::new()).unwrap();
//!
//! let press = MachineKey::new("siemens", "s7-1200").unwrap();
//! tx.try_send(TelemetrySample::builder(press).timestamp_ms(0).plc_running(true).build())
//!     .unwrap();
//! app.reload_data(0).unwrap();
//!
//! // Silent for a minute
//! app.tick(60_000);
//! let report = app.stoppages(&StoppageQuery::default(), 60_000);
//! assert_eq!(report.total, 1);
//! ```
//!
//! ### As a library with stream source (TCP, etc.)
//!
//! ```no_run
//! use plcwatch::{App, Settings, StreamSource};
//!
//! # tokio_test::block_on(async {
//! let stream = tokio::net::TcpStream::connect("localhost:9090").await.unwrap();
//! let source = StreamSource::spawn(stream, "localhost:9090");
//! let app = App::new(Some(Box::new(source)), Settings::default(), Vec::new()).unwrap();
//! # });
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod registry;
pub mod source;

pub use app::App;
pub use config::{ConfigError, Settings};
pub use data::{FleetData, FleetSummary, MachineData, Period, StoppageQuery, StoppageReport};
pub use registry::{MachineRegistry, StaticRegistry};
pub use source::{
    load_status_logs, ChannelSource, FileSource, IngestError, SampleSource, StreamSource,
};

pub use plcwatch_types::{
    format_duration, MachineKey, MachineStatus, StatusEvent, StoppageInterval, TelemetrySample,
};
