//! Views derived from the engine for display.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing of duration strings (e.g., "20s", "500ms")
//! - [`fleet`]: Current per-machine status and fleet counters
//! - [`stoppage`]: Period/machine filtered, paginated stoppage history
//!
//! ## Data Flow
//!
//! ```text
//! TelemetrySample batches
//!        │
//!        ▼
//! Engine (classify, detect, log)
//!        │
//!        ├──▶ FleetData::build()           (status now)
//!        │
//!        └──▶ StoppageReport::from_engine() (history for a period)
//! ```

pub mod duration;
pub mod fleet;
pub mod stoppage;

pub use fleet::{FleetData, FleetSummary, MachineData};
pub use stoppage::{Period, StoppageQuery, StoppageReport, DEFAULT_PAGE_LIMIT};
