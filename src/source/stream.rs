//! Stream-based sample source.
//!
//! Reads newline-delimited JSON telemetry from any async reader, such as a
//! TCP connection to a collector.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use plcwatch_types::TelemetrySample;

use super::wire::decode_sample;
use super::SampleSource;

/// A source that receives samples from an async byte stream.
///
/// A background task parses one record per line and hands samples to
/// `poll()`. Records that fail to decode are skipped and reported through
/// [`SampleSource::error`].
///
/// ```
/// use std::io::Cursor;
/// use plcwatch::StreamSource;
///
/// # tokio_test::block_on(async {
/// let data = b"{\"plc_brand\":\"siemens\",\"timestamp\":1000}\n";
/// let source = StreamSource::spawn(Cursor::new(data.to_vec()), "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<TelemetrySample>,
    description: String,
    shared_error: Arc<Mutex<Option<String>>>,
    last_error: Option<String>,
}

impl StreamSource {
    /// Spawn a background task reading from `reader`.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        let shared_error = Arc::new(Mutex::new(None));
        let error_handle = shared_error.clone();
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        *error_handle.lock() = Some("Connection closed".to_string());
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match decode_sample(trimmed.as_bytes()) {
                            Ok(sample) => {
                                if tx.send(sample).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(source = %desc, error = %e, "dropping telemetry line");
                                *error_handle.lock() = Some(format!("Parse error: {}", e));
                            }
                        }
                    }
                    Err(e) => {
                        *error_handle.lock() = Some(format!("Read error: {}", e));
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            shared_error,
            last_error: None,
        }
    }

    /// Build a source from a channel of raw JSON messages, one record each.
    pub fn from_bytes_channel(mut rx: mpsc::Receiver<Vec<u8>>, description: &str) -> Self {
        let (tx, sample_rx) = mpsc::channel(256);
        let shared_error = Arc::new(Mutex::new(None));
        let error_handle = shared_error.clone();

        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                match decode_sample(&bytes) {
                    Ok(sample) => {
                        if tx.send(sample).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        *error_handle.lock() = Some(format!("Parse error: {}", e));
                    }
                }
            }
        });

        Self {
            receiver: sample_rx,
            description: format!("stream: {}", description),
            shared_error,
            last_error: None,
        }
    }
}

impl SampleSource for StreamSource {
    fn poll(&mut self) -> Option<Vec<TelemetrySample>> {
        let mut batch = Vec::new();
        let mut disconnected = false;
        loop {
            match self.receiver.try_recv() {
                Ok(sample) => batch.push(sample),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        self.last_error = self.shared_error.lock().clone();
        if disconnected && self.last_error.is_none() {
            self.last_error = Some("Stream disconnected".to_string());
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
