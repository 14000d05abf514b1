//! Flood node binary
//!
//! Speaks newline-delimited JSON envelopes on stdin/stdout. Logs go to
//! stderr so they never interleave with protocol output.
//!
//! Environment:
//! - `FLOOD_LOG`: tracing filter directives (default `info`)
//! - `FLOOD_LOG_FORMAT`: `text` (default) or `json`
//! - `FLOOD_SUPPRESS_SENDER_ECHO`: `true` (default) or `false`

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use flood_core::FloodError;
use flood_runtime::{Node, NodeConfig};
use flood_transport::{Gateway, StdioTransport};

const LOG_FILTER_VAR: &str = "FLOOD_LOG";
const LOG_FORMAT_VAR: &str = "FLOOD_LOG_FORMAT";

fn init_tracing() -> Result<(), FloodError> {
    let filter = EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);

    match std::env::var(LOG_FORMAT_VAR).as_deref() {
        Ok("json") => builder.json().init(),
        Ok("text") | Err(_) => builder.init(),
        Ok(other) => {
            return Err(FloodError::InvalidConfig(format!(
                "{} must be text or json, got {:?}",
                LOG_FORMAT_VAR, other
            )))
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;
    let config = NodeConfig::from_env()?;

    let (transport, writer) = StdioTransport::spawn();
    let mut gateway = Gateway::new(Arc::new(transport));
    let node = Node::attach(&mut gateway, config);

    info!(config = ?node.config(), "flood node starting");
    gateway.run().await?;
    writer.await??;

    let counters = node.counters();
    info!(
        recorded = node.seen().len(),
        accepted = counters.accepted,
        duplicates = counters.duplicates,
        rejected = counters.rejected,
        forwarded = counters.forwarded,
        forward_failures = counters.forward_failures,
        "flood node stopped"
    );
    Ok(())
}
