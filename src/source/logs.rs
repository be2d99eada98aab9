//! Loading stored status logs.

use std::fs;
use std::path::Path;

use anyhow::Context;
use plcwatch_types::StatusEvent;

use super::wire::{decode_batch, IngestError, WireStatusLog};

/// Read a status-log export (JSON array or NDJSON) into events.
///
/// Entries of an unrecognized provenance are skipped at `debug`; entries
/// that cannot be identified or dated are skipped at `warn`.
pub fn load_status_logs(path: impl AsRef<Path>) -> anyhow::Result<Vec<StatusEvent>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading status logs from {}", path.display()))?;
    let records: Vec<WireStatusLog> = decode_batch(&content)
        .with_context(|| format!("parsing status logs in {}", path.display()))?;

    let total = records.len();
    let mut events = Vec::with_capacity(total);
    for record in records {
        match record.into_event() {
            Ok(event) => events.push(event),
            Err(IngestError::UnknownStatusType(kind)) => {
                tracing::debug!(status_type = %kind, "ignoring status log of unknown provenance");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping status log entry");
            }
        }
    }

    tracing::debug!(
        path = %path.display(),
        loaded = events.len(),
        skipped = total - events.len(),
        "status logs loaded"
    );
    Ok(events)
}
