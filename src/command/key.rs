//! Dispatch key for command handlers

use std::fmt;

/// A `(packet id, version)` pair identifying one command handler.
///
/// Keys order by packet id first, then by version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandHandlerKey {
    packet_id: u32,
    version: u32,
}

impl CommandHandlerKey {
    pub const fn new(packet_id: u32, version: u32) -> Self {
        Self { packet_id, version }
    }

    pub const fn packet_id(&self) -> u32 {
        self.packet_id
    }

    pub const fn version(&self) -> u32 {
        self.version
    }
}

impl fmt::Display for CommandHandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.packet_id, self.version)
    }
}
