//! Command handler capability

use std::fmt;

use super::CommandHandlerKey;
use crate::Result;
use crate::types::Packet;

/// Something that handles one kind of inbound packet.
///
/// Each handler is bound to a fixed `(packet id, version)` pair at construction.
/// Handlers are shared between the registry and the dispatching thread, so any state
/// they keep lives behind interior mutability.
pub trait CommandHandler: Send + Sync {
    fn packet_id(&self) -> u32;

    fn version(&self) -> u32;

    /// Handle one packet routed to this handler.
    fn handle(&self, packet: &Packet<'_>) -> Result<()>;

    /// The key this handler was built for.
    fn key(&self) -> CommandHandlerKey {
        CommandHandlerKey::new(self.packet_id(), self.version())
    }
}

/// Adapts a closure to the [`CommandHandler`] capability.
///
/// ```rust
/// use profwire::command::{CommandHandler, FnCommandHandler};
/// use profwire::types::Packet;
///
/// let handler = FnCommandHandler::new(3, 4_194_304, |packet: &Packet<'_>| {
///     assert_eq!(packet.packet_id(), 3);
///     Ok(())
/// });
/// let packet = Packet::new(Packet::header_for(0, 3), 0, None).unwrap();
/// handler.handle(&packet).unwrap();
/// ```
pub struct FnCommandHandler<F> {
    packet_id: u32,
    version: u32,
    handler: F,
}

impl<F> FnCommandHandler<F>
where
    F: Fn(&Packet<'_>) -> Result<()> + Send + Sync,
{
    pub fn new(packet_id: u32, version: u32, handler: F) -> Self {
        Self { packet_id, version, handler }
    }
}

impl<F> CommandHandler for FnCommandHandler<F>
where
    F: Fn(&Packet<'_>) -> Result<()> + Send + Sync,
{
    fn packet_id(&self) -> u32 {
        self.packet_id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn handle(&self, packet: &Packet<'_>) -> Result<()> {
        (self.handler)(packet)
    }
}

impl<F> fmt::Debug for FnCommandHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommandHandler")
            .field("packet_id", &self.packet_id)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
