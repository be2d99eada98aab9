//! Sample sources.
//!
//! Telemetry reaches the engine either as a bulk query result (a file holding
//! a JSON array or NDJSON) or as discrete push messages (a channel or a
//! network stream). Every source yields batches of [`TelemetrySample`] so
//! both paths feed the same detector without branching.

mod channel;
mod file;
mod logs;
mod stream;
pub mod wire;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use logs::load_status_logs;
pub use stream::StreamSource;
pub use wire::{IngestError, WireSample, WireStatusLog, WireTimestamp};

use std::fmt::Debug;

use plcwatch_types::TelemetrySample;

/// Trait for receiving telemetry from various sources.
///
/// # Example
///
/// ```
/// use plcwatch::{FileSource, SampleSource};
///
/// let mut source = FileSource::new("telemetry.json");
/// if let Some(batch) = source.poll() {
///     println!("Got {} samples", batch.len());
/// }
/// ```
pub trait SampleSource: Send + Debug {
    /// Poll for new samples.
    ///
    /// Returns `Some(batch)` if new data is available, `None` otherwise.
    /// This method must not block.
    fn poll(&mut self) -> Option<Vec<TelemetrySample>>;

    /// Human-readable description of the source.
    fn description(&self) -> &str;

    /// The error from the last poll, if any.
    fn error(&self) -> Option<&str>;
}
