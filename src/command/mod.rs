//! Command dispatch: handler capability, dispatch keys, version resolution and the
//! handler registry.
//!
//! A packet is routed by resolving the protocol version for its packet id, building a
//! [`CommandHandlerKey`] from the pair and looking that key up in a
//! [`CommandHandlerRegistry`].
//!
//! ```rust
//! use std::sync::Arc;
//! use profwire::command::{
//!     CommandHandlerRegistry, DefaultPacketVersionResolver, FnCommandHandler,
//!     PacketVersionResolver,
//! };
//! use profwire::types::Packet;
//!
//! let resolver = DefaultPacketVersionResolver;
//! let registry = CommandHandlerRegistry::new();
//! let version = resolver.resolve_packet_version(43).encoded();
//! registry.register(Arc::new(FnCommandHandler::new(43, version, |_| Ok(()))));
//!
//! let packet = Packet::new(472_580_096, 0, None).unwrap();
//! let handler = registry.get_handler(packet.packet_id(), version).unwrap();
//! handler.handle(&packet).unwrap();
//! ```

mod handler;
pub mod handlers;
mod key;
mod registry;
mod resolver;

pub use handler::{CommandHandler, FnCommandHandler};
pub use key::CommandHandlerKey;
pub use registry::CommandHandlerRegistry;
pub use resolver::{DefaultPacketVersionResolver, PacketVersionResolver};
