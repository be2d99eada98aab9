//! Output backends for emitting fleet snapshots.

use std::path::PathBuf;

use plcwatch_types::FleetSnapshot;

/// Output destination for fleet snapshots.
#[derive(Debug)]
pub enum Output {
    /// Write snapshots to a JSON file, overwritten on every tick.
    File(PathBuf),

    /// Send each snapshot as one line of JSON to a TCP server.
    Tcp(String),

    /// Send snapshots through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    #[cfg(feature = "tokio")]
    Channel(tokio::sync::mpsc::Sender<FleetSnapshot>),
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use plcwatch_sdk::Output;
    ///
    /// let output = Output::file("fleet.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// # Example
    ///
    /// ```rust
    /// use plcwatch_sdk::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    ///
    /// // while let Some(snapshot) = rx.recv().await {
    /// //     println!("{} machines stopped", snapshot.count(MachineStatus::Stopped));
    /// // }
    /// ```
    #[cfg(feature = "tokio")]
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<FleetSnapshot>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Emit a snapshot to this output.
    #[cfg(feature = "tokio")]
    pub(crate) async fn emit(&self, snapshot: &FleetSnapshot) -> std::io::Result<()> {
        match self {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(snapshot)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Tcp(addr) => {
                use tokio::io::AsyncWriteExt;
                use tokio::net::TcpStream;

                // Best effort: a collector that is down just misses this tick
                if let Ok(mut stream) = TcpStream::connect(addr).await {
                    let mut line = serde_json::to_string(snapshot)?;
                    line.push('\n');
                    stream.write_all(line.as_bytes()).await?;
                }
            }
            Output::Channel(tx) => {
                // Don't block the tick if the consumer is slow
                if tx.try_send(snapshot.clone()).is_err() {
                    tracing::debug!("snapshot channel full or closed, dropping snapshot");
                }
            }
        }
        Ok(())
    }
}
