//! Packet version resolution

use crate::types::Version;

/// Decides which protocol version applies to a packet id.
pub trait PacketVersionResolver: Send + Sync {
    fn resolve_packet_version(&self, packet_id: u32) -> Version;
}

/// Resolves every packet id to version `1.0.0`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPacketVersionResolver;

impl DefaultPacketVersionResolver {
    pub const VERSION: Version = Version::new(1, 0, 0);
}

impl PacketVersionResolver for DefaultPacketVersionResolver {
    fn resolve_packet_version(&self, _packet_id: u32) -> Version {
        Self::VERSION
    }
}
