//! In-process packet source backed by a tokio channel

use tokio::sync::mpsc;
use tracing::trace;

use crate::Result;
use crate::source::PacketSource;
use crate::types::PacketBuffer;

/// Receives packets pushed by a [`ChannelSender`] in the same process.
///
/// The stream ends once every sender has been dropped and the buffer is drained.
#[derive(Debug)]
pub struct ChannelSource {
    receiver: mpsc::Receiver<PacketBuffer>,
}

/// Sending half of a [`ChannelSource`].
pub type ChannelSender = mpsc::Sender<PacketBuffer>;

impl ChannelSource {
    /// Create a source buffering up to `capacity` packets, with its sender.
    pub fn new(capacity: usize) -> (ChannelSender, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (sender, Self { receiver })
    }
}

#[async_trait::async_trait]
impl PacketSource for ChannelSource {
    async fn next_packet(&mut self) -> Result<Option<PacketBuffer>> {
        let packet = self.receiver.recv().await;
        if let Some(packet) = &packet {
            trace!(header = packet.header(), bytes = packet.len(), "Packet received");
        }
        Ok(packet)
    }
}
