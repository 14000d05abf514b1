//! Outbound seam between the gateway and the network

use flood_core::FloodResult;
use flood_wire::Envelope;

/// Carries fully addressed envelopes to their destination
pub trait Transport: Send + Sync + 'static {
    /// Hand an envelope to the network. Must not block.
    fn transmit(&self, envelope: Envelope) -> FloodResult<()>;

    /// Stop accepting envelopes. Envelopes already accepted are still delivered.
    fn close(&self) {}
}
