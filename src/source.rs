//! Packet source trait for inbound profiling data

use crate::Result;
use crate::types::PacketBuffer;

/// Something that delivers framed packets to a profiling session.
///
/// Sources own their transport and its timing; the driver only asks for the next
/// packet. The bytes are handed over as owned [`PacketBuffer`]s because they cross a
/// task boundary before being dispatched.
#[async_trait::async_trait]
pub trait PacketSource: Send + 'static {
    /// Get the next packet
    ///
    /// Returns:
    /// - `Ok(Some(packet))` - a packet arrived
    /// - `Ok(None)` - the source is exhausted (normal termination)
    /// - `Err(e)` - reading failed; the driver may call again after backing off
    async fn next_packet(&mut self) -> Result<Option<PacketBuffer>>;
}
