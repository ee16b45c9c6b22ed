//! Core types for the profiling protocol.
//!
//! This module provides the value types exchanged between the transport, the command
//! handlers and the session state.
//!
//! ## Architecture
//!
//! - [`Version`] packs a `(major, minor, patch)` triple into one wire word
//! - [`Packet`] is a borrowed, length-validated view of one framed message
//! - [`PacketBuffer`] owns a packet payload so it can cross task boundaries
//! - [`ProfilingState`] enumerates the session lifecycle and its legal transitions
//! - [`CaptureData`] is the periodic counter capture configuration
//!
//! ## Usage Example
//!
//! ```rust
//! use profwire::types::{Packet, Version};
//!
//! let version = Version::from_encoded(4_198_412);
//! assert_eq!(version.to_string(), "1.1.12");
//!
//! let packet = Packet::new(472_580_096, 0, None).unwrap();
//! assert_eq!(packet.family(), 7);
//! assert_eq!(packet.packet_id(), 43);
//! ```

mod capture_data;
mod packet;
mod profiling_state;
mod version;

// Re-export all public types
pub use capture_data::CaptureData;
pub use packet::{FRAME_PREFIX_SIZE, Packet, PacketBuffer};
pub use profiling_state::ProfilingState;
pub use version::{Version, decode_version, encode_version};
