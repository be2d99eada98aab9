//! Wire formats accepted from PLC collectors and the status-log backend.
//!
//! Everything coming off the wire is decoded here and turned into the typed
//! model. Machine identity is normalized once, timestamps are parsed once,
//! and records that cannot be identified are rejected before they reach the
//! engine.

use chrono::{DateTime, NaiveDateTime};
use plcwatch_types::{
    EventType, KeyError, MachineKey, MachineStatus, Readings, StatusEvent, StatusType,
    TelemetrySample,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Reasons a wire record cannot be turned into a sample or event.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("record has neither plc_brand nor machine_key")]
    MissingIdentity,

    #[error("invalid machine identity: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("status log has no timestamp")]
    MissingTimestamp,

    #[error("unrecognized status_type {0:?}")]
    UnknownStatusType(String),

    #[error("unrecognized event_type {0:?}")]
    UnknownEventType(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A timestamp as sent by collectors: epoch milliseconds or an ISO 8601 string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(u64),
    Text(String),
}

impl WireTimestamp {
    /// Milliseconds since the Unix epoch.
    ///
    /// Strings without an offset are taken as UTC.
    pub fn to_millis(&self) -> Result<u64, IngestError> {
        match self {
            WireTimestamp::Millis(ms) => Ok(*ms),
            WireTimestamp::Text(text) => parse_timestamp(text),
        }
    }
}

fn parse_timestamp(text: &str) -> Result<u64, IngestError> {
    let text = text.trim();
    let invalid = || IngestError::InvalidTimestamp(text.to_string());

    let millis = if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        dt.timestamp_millis()
    } else {
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .map_err(|_| invalid())?
            .and_utc()
            .timestamp_millis()
    };

    u64::try_from(millis).map_err(|_| invalid())
}

/// A boolean flag sent either as `true`/`false` or as `0`/`1`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
enum WireFlag {
    Bool(bool),
    Int(u8),
}

impl WireFlag {
    fn as_u8(self) -> u8 {
        match self {
            WireFlag::Bool(b) => b as u8,
            WireFlag::Int(i) => i,
        }
    }
}

fn flag(value: Option<WireFlag>) -> u8 {
    value.map(WireFlag::as_u8).unwrap_or(0)
}

fn resolve_key(
    brand: Option<&str>,
    model: Option<&str>,
    joined: Option<&str>,
) -> Result<MachineKey, IngestError> {
    match (brand.filter(|b| !b.trim().is_empty()), joined) {
        (Some(brand), _) => Ok(MachineKey::new(brand, model.unwrap_or(""))?),
        (None, Some(joined)) if !joined.trim().is_empty() => Ok(MachineKey::parse(joined)?),
        _ => Err(IngestError::MissingIdentity),
    }
}

/// One telemetry record as pushed by a collector or returned by a bulk query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireSample {
    #[serde(default)]
    pub machine_key: Option<String>,
    #[serde(default)]
    pub plc_brand: Option<String>,
    #[serde(default)]
    pub plc_model: Option<String>,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
    #[serde(default)]
    plc_running: Option<WireFlag>,
    #[serde(default)]
    motor_status: Option<WireFlag>,
    #[serde(default)]
    production_active: Option<WireFlag>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub rpm: Option<f64>,
    #[serde(default)]
    pub production_count: Option<u64>,
    #[serde(default)]
    pub stopped_at: Option<WireTimestamp>,
}

impl WireSample {
    /// Convert into a typed sample.
    ///
    /// A missing timestamp is kept as `None` so the sample classifies as
    /// stopped; an unparseable one is an error.
    pub fn into_sample(self) -> Result<TelemetrySample, IngestError> {
        let key = resolve_key(
            self.plc_brand.as_deref(),
            self.plc_model.as_deref(),
            self.machine_key.as_deref(),
        )?;

        let mut builder = TelemetrySample::builder(key)
            .plc_running(flag(self.plc_running) != 0)
            .motor_status(flag(self.motor_status))
            .production_active(flag(self.production_active))
            .readings(Readings {
                temperature: self.temperature.unwrap_or(0.0),
                pressure: self.pressure.unwrap_or(0.0),
                rpm: self.rpm.unwrap_or(0.0),
                production_count: self.production_count.unwrap_or(0),
            });

        if let Some(ts) = &self.timestamp {
            builder = builder.timestamp_ms(ts.to_millis()?);
        }
        if let Some(ts) = &self.stopped_at {
            builder = builder.stopped_at_ms(ts.to_millis()?);
        }
        Ok(builder.build())
    }
}

/// One status log entry as stored by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct WireStatusLog {
    #[serde(default)]
    pub machine_key: Option<String>,
    #[serde(default)]
    pub plc_brand: Option<String>,
    #[serde(default)]
    pub plc_model: Option<String>,
    #[serde(default)]
    pub timestamp: Option<WireTimestamp>,
    pub event_type: String,
    pub status_type: String,
    #[serde(default)]
    pub previous_status: Option<String>,
    #[serde(default)]
    pub current_status: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub rpm: Option<f64>,
    #[serde(default)]
    pub production_count: Option<u64>,
}

/// Map a provenance label to its status type.
///
/// `plc_running` is the older name of `legacy_running_flag`.
pub fn parse_status_type(label: &str) -> Option<StatusType> {
    match label.trim() {
        "initial" => Some(StatusType::Initial),
        "status" => Some(StatusType::Status),
        "legacy_running_flag" | "plc_running" => Some(StatusType::LegacyRunningFlag),
        _ => None,
    }
}

fn parse_event_type(label: &str) -> Option<EventType> {
    match label.trim() {
        "started" => Some(EventType::Started),
        "stopped" => Some(EventType::Stopped),
        _ => None,
    }
}

impl WireStatusLog {
    pub fn into_event(self) -> Result<StatusEvent, IngestError> {
        let status_type = parse_status_type(&self.status_type)
            .ok_or_else(|| IngestError::UnknownStatusType(self.status_type.clone()))?;
        let event_type = parse_event_type(&self.event_type)
            .ok_or_else(|| IngestError::UnknownEventType(self.event_type.clone()))?;
        let machine_key = resolve_key(
            self.plc_brand.as_deref(),
            self.plc_model.as_deref(),
            self.machine_key.as_deref(),
        )?;
        let timestamp_ms = self
            .timestamp
            .as_ref()
            .ok_or(IngestError::MissingTimestamp)?
            .to_millis()?;

        let current_status = self
            .current_status
            .as_deref()
            .and_then(MachineStatus::from_label)
            .unwrap_or(match event_type {
                EventType::Stopped => MachineStatus::Stopped,
                EventType::Started => MachineStatus::Running,
            });
        let previous_status = self
            .previous_status
            .as_deref()
            .and_then(MachineStatus::from_label);

        Ok(StatusEvent {
            machine_key,
            timestamp_ms,
            event_type,
            status_type,
            previous_status,
            current_status,
            readings: Readings {
                temperature: self.temperature.unwrap_or(0.0),
                pressure: self.pressure.unwrap_or(0.0),
                rpm: self.rpm.unwrap_or(0.0),
                production_count: self.production_count.unwrap_or(0),
            },
        })
    }
}

/// Decode a batch of records: a JSON array, or one JSON object per line.
///
/// A line that does not parse is skipped with a warning. The batch only
/// fails if it has lines and none of them parse.
pub fn decode_batch<T: DeserializeOwned>(content: &str) -> Result<Vec<T>, serde_json::Error> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed);
    }

    let mut records = Vec::new();
    let mut first_error = None;
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "skipping malformed record");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if records.is_empty() => Err(e),
        _ => Ok(records),
    }
}

/// Convert wire samples, dropping the ones that cannot be identified.
pub fn into_samples(records: Vec<WireSample>) -> Vec<TelemetrySample> {
    records
        .into_iter()
        .filter_map(|record| match record.into_sample() {
            Ok(sample) => Some(sample),
            Err(e) => {
                tracing::warn!(error = %e, "dropping telemetry record");
                None
            }
        })
        .collect()
}

/// Decode one pushed message into a sample.
pub fn decode_sample(bytes: &[u8]) -> Result<TelemetrySample, IngestError> {
    let record: WireSample = serde_json::from_slice(bytes)?;
    record.into_sample()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_accepts_millis_and_rfc3339() {
        assert_eq!(WireTimestamp::Millis(1_700_000_000_000).to_millis().unwrap(), 1_700_000_000_000);
        let text = WireTimestamp::Text("2024-01-01T00:00:30Z".into());
        assert_eq!(text.to_millis().unwrap(), 1_704_067_230_000);
        let offset = WireTimestamp::Text("2024-01-01T01:00:30+01:00".into());
        assert_eq!(offset.to_millis().unwrap(), 1_704_067_230_000);
    }

    #[test]
    fn naive_timestamp_is_utc() {
        let naive = WireTimestamp::Text("2024-01-01T00:00:30.500".into());
        assert_eq!(naive.to_millis().unwrap(), 1_704_067_230_500);
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let garbage = WireTimestamp::Text("yesterday".into());
        assert!(matches!(garbage.to_millis(), Err(IngestError::InvalidTimestamp(_))));
    }

    #[test]
    fn sample_from_json() {
        let json = r#"{
            "plc_brand": " Siemens ",
            "plc_model": "S7-1200",
            "timestamp": "2024-01-01T00:00:00Z",
            "plc_running": 1,
            "motor_status": 1,
            "production_active": 0,
            "temperature": 41.5,
            "production_count": 1200
        }"#;
        let sample = decode_sample(json.as_bytes()).unwrap();

        assert_eq!(sample.machine_key.as_string(), "siemens_s7-1200");
        assert_eq!(sample.timestamp_ms, Some(1_704_067_200_000));
        assert!(sample.plc_running);
        assert!(sample.motor_on());
        assert!(!sample.production_on());
        assert_eq!(sample.readings.temperature, 41.5);
        assert_eq!(sample.readings.rpm, 0.0);
        assert_eq!(sample.readings.production_count, 1200);
    }

    #[test]
    fn sample_accepts_boolean_flags_and_joined_key() {
        let json = r#"{"machine_key": "Delta_DVP", "timestamp": 5000, "plc_running": true}"#;
        let sample = decode_sample(json.as_bytes()).unwrap();
        assert_eq!(sample.machine_key, MachineKey::new("delta", "dvp").unwrap());
        assert!(sample.plc_running);
    }

    #[test]
    fn sample_without_timestamp_is_kept_as_malformed() {
        let json = r#"{"plc_brand": "omron", "plc_running": true}"#;
        let sample = decode_sample(json.as_bytes()).unwrap();
        assert!(!sample.is_well_formed());
    }

    #[test]
    fn sample_without_identity_is_rejected() {
        let json = r#"{"timestamp": 5000, "plc_brand": "  "}"#;
        assert!(matches!(
            decode_sample(json.as_bytes()),
            Err(IngestError::MissingIdentity)
        ));
    }

    #[test]
    fn status_log_decodes() {
        let json = r#"{
            "plc_brand": "Omron", "plc_model": "CP1E",
            "timestamp": "2024-01-01T00:00:00Z",
            "event_type": "stopped", "status_type": "status",
            "previous_status": "running", "current_status": "stopped",
            "rpm": 12.5
        }"#;
        let log: WireStatusLog = serde_json::from_str(json).unwrap();
        let event = log.into_event().unwrap();

        assert_eq!(event.machine_key.as_string(), "omron_cp1e");
        assert_eq!(event.event_type, EventType::Stopped);
        assert_eq!(event.status_type, StatusType::Status);
        assert_eq!(event.previous_status, Some(MachineStatus::Running));
        assert_eq!(event.readings.rpm, 12.5);
    }

    #[test]
    fn legacy_alias_maps_to_running_flag() {
        assert_eq!(parse_status_type("plc_running"), Some(StatusType::LegacyRunningFlag));
        assert_eq!(parse_status_type("legacy_running_flag"), Some(StatusType::LegacyRunningFlag));
        assert_eq!(parse_status_type("heartbeat"), None);
    }

    #[test]
    fn unknown_status_type_is_reported() {
        let json = r#"{"plc_brand": "a", "timestamp": 1, "event_type": "stopped", "status_type": "heartbeat"}"#;
        let log: WireStatusLog = serde_json::from_str(json).unwrap();
        assert!(matches!(log.into_event(), Err(IngestError::UnknownStatusType(_))));
    }

    #[test]
    fn missing_current_status_follows_event_type() {
        let json = r#"{"plc_brand": "a", "timestamp": 1, "event_type": "started", "status_type": "plc_running"}"#;
        let log: WireStatusLog = serde_json::from_str(json).unwrap();
        let event = log.into_event().unwrap();
        assert_eq!(event.current_status, MachineStatus::Running);
        assert_eq!(event.previous_status, None);
    }

    #[test]
    fn decode_batch_handles_array_and_ndjson() {
        let array = r#"[{"plc_brand": "a", "timestamp": 1}, {"plc_brand": "b", "timestamp": 2}]"#;
        let ndjson = "{\"plc_brand\": \"a\", \"timestamp\": 1}\n\n{\"plc_brand\": \"b\", \"timestamp\": 2}\n";

        let from_array: Vec<WireSample> = decode_batch(array).unwrap();
        let from_lines: Vec<WireSample> = decode_batch(ndjson).unwrap();
        assert_eq!(from_array.len(), 2);
        assert_eq!(from_lines.len(), 2);
    }

    #[test]
    fn decode_batch_skips_malformed_lines() {
        let ndjson = concat!(
            "{\"plc_brand\": \"a\", \"timestamp\": 1}\n",
            "{\"plc_brand\": \"b\", \"timest\n",
            "{\"plc_brand\": \"c\", \"timestamp\": 3}\n",
        );
        let records: Vec<WireSample> = decode_batch(ndjson).unwrap();
        let samples = into_samples(records);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].machine_key.brand(), "c");

        assert!(decode_batch::<WireSample>("garbage\nmore garbage").is_err());
        assert!(decode_batch::<WireSample>("").unwrap().is_empty());
    }

    #[test]
    fn into_samples_drops_unidentified() {
        let records: Vec<WireSample> =
            decode_batch(r#"[{"plc_brand": "a", "timestamp": 1}, {"timestamp": 2}]"#).unwrap();
        assert_eq!(into_samples(records).len(), 1);
    }
}
