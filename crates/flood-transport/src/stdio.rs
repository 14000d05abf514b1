//! Stdout transport: one JSON line per envelope

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use flood_core::{FloodError, FloodResult};
use flood_wire::Envelope;

use crate::Transport;

/// Writer handle returned alongside the transport
pub type WriterHandle = JoinHandle<FloodResult<()>>;

/// Line transport over an async writer (stdout in production)
pub struct StdioTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
}

impl StdioTransport {
    /// Start a writer task on stdout
    pub fn spawn() -> (Self, WriterHandle) {
        Self::spawn_with(tokio::io::stdout())
    }

    /// Start a writer task on any async writer
    pub fn spawn_with<W>(writer: W) -> (Self, WriterHandle)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_loop(writer, rx));

        (
            StdioTransport {
                tx: Mutex::new(Some(tx)),
            },
            handle,
        )
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Envelope>) -> FloodResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = rx.recv().await {
        let mut line = match envelope.to_line() {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(dest = %envelope.dest, error = %e, "dropping unserializable envelope");
                continue;
            }
        };
        line.push('\n');

        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| FloodError::TransportError(e.to_string()))?;
        writer
            .flush()
            .await
            .map_err(|e| FloodError::TransportError(e.to_string()))?;
    }
    Ok(())
}

impl Transport for StdioTransport {
    fn transmit(&self, envelope: Envelope) -> FloodResult<()> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(FloodError::TransportClosed)?;
        tx.send(envelope).map_err(|_| FloodError::TransportClosed)
    }

    fn close(&self) {
        self.tx.lock().take();
    }
}
