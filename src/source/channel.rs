//! Channel-based sample source.
//!
//! Receives discrete push messages through a tokio mpsc channel. A message
//! bus consumer or a test harness holds the sender.

use tokio::sync::mpsc;

use plcwatch_types::TelemetrySample;

use super::SampleSource;

/// A source fed by pushed samples.
///
/// # Example
///
/// ```
/// use plcwatch::{ChannelSource, SampleSource};
///
/// let (tx, mut source) = ChannelSource::create("line-3 gateway");
/// assert!(source.poll().is_none());
/// # drop(tx);
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<TelemetrySample>,
    description: String,
    last_error: Option<String>,
}

/// Capacity of channels built by [`ChannelSource::create`].
const CHANNEL_CAPACITY: usize = 1024;

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<TelemetrySample>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            last_error: None,
        }
    }

    /// Create a channel pair. Push samples into the sender; poll the source.
    pub fn create(source_description: &str) -> (mpsc::Sender<TelemetrySample>, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (tx, Self::new(rx, source_description))
    }
}

impl SampleSource for ChannelSource {
    /// Drains everything pushed since the last poll.
    fn poll(&mut self) -> Option<Vec<TelemetrySample>> {
        let mut batch = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(sample) => batch.push(sample),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.last_error = Some("Channel closed".to_string());
                    break;
                }
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
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
    use plcwatch_types::MachineKey;

    fn sample(ts: u64) -> TelemetrySample {
        TelemetrySample::builder(MachineKey::new("siemens", "s7").unwrap())
            .timestamp_ms(ts)
            .plc_running(true)
            .build()
    }

    #[test]
    fn test_channel_source_drains_batch() {
        let (tx, mut source) = ChannelSource::create("test");

        assert!(source.poll().is_none());

        tx.try_send(sample(1)).unwrap();
        tx.try_send(sample(2)).unwrap();

        let batch = source.poll().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].timestamp_ms, Some(2));

        assert!(source.poll().is_none());
        assert!(source.error().is_none());
    }

    #[test]
    fn test_channel_source_reports_closed_sender() {
        let (tx, mut source) = ChannelSource::create("test");
        tx.try_send(sample(1)).unwrap();
        drop(tx);

        // Buffered samples are still delivered
        assert_eq!(source.poll().unwrap().len(), 1);
        assert_eq!(source.error(), Some("Channel closed"));
        assert_eq!(source.description(), "channel: test");
    }
}
