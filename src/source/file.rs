//! File-based sample source.
//!
//! Reads a bulk query result from disk: a JSON array of telemetry records or
//! one record per line.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use plcwatch_types::TelemetrySample;

use super::wire::{decode_batch, into_samples, WireSample};
use super::SampleSource;

/// A source that reads telemetry samples from a JSON file.
///
/// The source tracks the file's modification time and only returns new
/// data when the file has been rewritten.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    fn read_file(&mut self) -> Option<Vec<TelemetrySample>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                return None;
            }
        };

        match decode_batch::<WireSample>(&content) {
            Ok(records) => {
                self.last_error = None;
                Some(into_samples(records))
            }
            Err(e) => {
                self.last_error = Some(format!("Parse error: {}", e));
                None
            }
        }
    }
}

impl SampleSource for FileSource {
    fn poll(&mut self) -> Option<Vec<TelemetrySample>> {
        let current_modified = self.modified_time();

        let file_changed = match (&self.last_modified, &current_modified) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(last), Some(current)) => current > last,
        };

        if file_changed {
            if let Some(batch) = self.read_file() {
                self.last_modified = current_modified;
                return Some(batch);
            }
        }

        None
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_json() -> &'static str {
        r#"[
            {"plc_brand": "Siemens", "plc_model": "S7-1200", "timestamp": 1000, "plc_running": 1},
            {"plc_brand": "Omron", "plc_model": "CP1E", "timestamp": "2024-01-01T00:00:00Z"}
        ]"#
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/telemetry.json");
        assert_eq!(source.path(), Path::new("/tmp/telemetry.json"));
        assert_eq!(source.description(), "file: /tmp/telemetry.json");
        assert!(source.error().is_none());
    }

    #[test]
    fn test_file_source_poll_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());

        let batch = source.poll().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].machine_key.as_string(), "siemens_s7-1200");

        // Unchanged file yields nothing
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_reads_ndjson() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"plc_brand": "a", "timestamp": 1}}"#).unwrap();
        writeln!(file, r#"{{"plc_brand": "b", "timestamp": 2}}"#).unwrap();
        writeln!(file, r#"{{"plc_brand": "c", "timestamp": 3}}"#).unwrap();

        let mut source = FileSource::new(file.path());
        assert_eq!(source.poll().unwrap().len(), 3);
    }

    #[test]
    fn test_file_source_skips_truncated_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"plc_brand": "a", "timestamp": 1}}"#).unwrap();
        writeln!(file, r#"{{"plc_brand": "b", "timest"#).unwrap();
        writeln!(file, r#"{{"plc_brand": "c", "timestamp": 3}}"#).unwrap();

        let mut source = FileSource::new(file.path());
        let batch = source.poll().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].machine_key.brand(), "c");
        assert!(source.error().is_none());
    }

    #[test]
    fn test_file_source_drops_unidentified_records() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"[{{"plc_brand": "a", "timestamp": 1}}, {{"timestamp": 2}}]"#).unwrap();

        let mut source = FileSource::new(file.path());
        assert_eq!(source.poll().unwrap().len(), 1);
        assert!(source.error().is_none());
    }

    #[test]
    fn test_file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/telemetry.json");

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Read error"));
    }

    #[test]
    fn test_file_source_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let mut source = FileSource::new(file.path());

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Parse error"));
    }
}
