//! Packet framing for the profiling protocol
//!
//! A packet is a 32-bit header word, a 32-bit payload length and the payload bytes.
//! The header routes the packet:
//!
//! ```text
//!  31      26 25             16 15                0
//! +----------+-----------------+-------------------+
//! |  family  |    packet id    |     reserved      |
//! +----------+-----------------+-------------------+
//!               |  class  |type|
//! ```
//!
//! [`Packet`] borrows its payload from the framing buffer. [`PacketBuffer`] owns the
//! payload for packets that have to cross a task boundary.

use std::sync::Arc;
use tracing::trace;

use crate::{ProfilingError, Result};

const FAMILY_SHIFT: u32 = 26;
const FAMILY_MASK: u32 = 0x3F;
const PACKET_ID_SHIFT: u32 = 16;
const PACKET_ID_MASK: u32 = 0x3FF;
const PACKET_TYPE_MASK: u32 = 0b111;
const PACKET_CLASS_SHIFT: u32 = 3;

/// Size of the frame prefix (header word + length word) written by [`PacketBuffer::encode`].
pub const FRAME_PREFIX_SIZE: usize = 8;

/// An immutable, length-validated view of one protocol packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    header: u32,
    length: u32,
    data: Option<&'a [u8]>,
}

impl<'a> Packet<'a> {
    /// Build a packet from its header, declared length and payload view.
    ///
    /// A zero length must come with no payload at all (an empty slice still counts as
    /// a payload). A non-zero length must come with exactly `length` bytes.
    pub fn new(header: u32, length: u32, data: Option<&'a [u8]>) -> Result<Self> {
        match (length, data) {
            (0, None) => {}
            (0, Some(_)) => {
                return Err(ProfilingError::invalid_payload(
                    header,
                    length,
                    "payload supplied for a zero-length packet",
                ));
            }
            (_, None) => {
                return Err(ProfilingError::invalid_payload(
                    header,
                    length,
                    "no payload supplied for a non-empty packet",
                ));
            }
            (_, Some(bytes)) if bytes.len() != length as usize => {
                return Err(ProfilingError::invalid_payload(
                    header,
                    length,
                    format!("payload is {} bytes", bytes.len()),
                ));
            }
            (_, Some(_)) => {}
        }

        Ok(Self { header, length, data })
    }

    /// Compose a header word from a family and a packet id.
    pub const fn header_for(family: u32, packet_id: u32) -> u32 {
        ((family & FAMILY_MASK) << FAMILY_SHIFT) | ((packet_id & PACKET_ID_MASK) << PACKET_ID_SHIFT)
    }

    /// Compose a packet id from its class and type.
    pub const fn packet_id_for(class: u32, packet_type: u32) -> u32 {
        ((class << PACKET_CLASS_SHIFT) | (packet_type & PACKET_TYPE_MASK)) & PACKET_ID_MASK
    }

    /// Parse one frame (header word, length word, payload; little-endian) from the
    /// front of `bytes`. Returns the packet and the number of bytes consumed.
    pub fn parse_frame(bytes: &'a [u8]) -> Result<(Self, usize)> {
        if bytes.len() < FRAME_PREFIX_SIZE {
            return Err(ProfilingError::parse_error(
                "Packet framing",
                format!(
                    "Insufficient data for frame prefix (need {} bytes, have {})",
                    FRAME_PREFIX_SIZE,
                    bytes.len()
                ),
            ));
        }

        let header = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let end = FRAME_PREFIX_SIZE + length as usize;
        if bytes.len() < end {
            return Err(ProfilingError::parse_error(
                "Packet framing",
                format!(
                    "Frame declares {} payload bytes but only {} remain",
                    length,
                    bytes.len() - FRAME_PREFIX_SIZE
                ),
            ));
        }

        let data = (length > 0).then(|| &bytes[FRAME_PREFIX_SIZE..end]);
        let packet = Self::new(header, length, data)?;
        trace!(
            family = packet.family(),
            packet_id = packet.packet_id(),
            length,
            "Parsed packet frame"
        );
        Ok((packet, end))
    }

    pub fn header(&self) -> u32 {
        self.header
    }

    /// Packet family (header bits 26-31).
    pub fn family(&self) -> u32 {
        (self.header >> FAMILY_SHIFT) & FAMILY_MASK
    }

    /// Packet id within the family (header bits 16-25).
    pub fn packet_id(&self) -> u32 {
        (self.header >> PACKET_ID_SHIFT) & PACKET_ID_MASK
    }

    /// Low three bits of the packet id.
    pub fn packet_type(&self) -> u32 {
        self.packet_id() & PACKET_TYPE_MASK
    }

    /// Packet id without its type bits.
    pub fn packet_class(&self) -> u32 {
        self.packet_id() >> PACKET_CLASS_SHIFT
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// The payload view, `None` for zero-length packets.
    pub fn data(&self) -> Option<&'a [u8]> {
        self.data
    }

    /// The payload as a slice, empty for zero-length packets.
    pub fn payload(&self) -> &'a [u8] {
        self.data.unwrap_or_default()
    }

    /// Copy this packet into an owned buffer.
    pub fn to_buffer(&self) -> PacketBuffer {
        PacketBuffer::new(self.header, self.payload().to_vec())
    }
}

/// A packet that owns its payload.
///
/// Used wherever the originating byte buffer cannot be guaranteed to outlive dispatch,
/// e.g. packets queued between a transport task and the command driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBuffer {
    header: u32,
    data: Arc<[u8]>,
}

impl PacketBuffer {
    pub fn new(header: u32, data: Vec<u8>) -> Self {
        Self { header, data: data.into() }
    }

    /// A packet with no payload.
    pub fn empty(header: u32) -> Self {
        Self::new(header, Vec::new())
    }

    pub fn header(&self) -> u32 {
        self.header
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow this buffer as a [`Packet`].
    pub fn as_packet(&self) -> Result<Packet<'_>> {
        let length = length_word(self.header, self.data.len())?;
        let data = (length > 0).then_some(&self.data[..]);
        Packet::new(self.header, length, data)
    }

    /// Write this packet as a frame: header word, length word, payload.
    ///
    /// Fails with [`ProfilingError::InvalidPayload`] when the payload does not fit the
    /// 32-bit length word.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let length = length_word(self.header, self.data.len())?;
        let mut frame = Vec::with_capacity(FRAME_PREFIX_SIZE + self.data.len());
        frame.extend_from_slice(&self.header.to_le_bytes());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&self.data);
        Ok(frame)
    }
}

fn length_word(header: u32, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        ProfilingError::invalid_payload(header, u32::MAX, "payload exceeds u32 length")
    })
}
