//! Wire format for timeline packets
//!
//! A timeline packet payload is a run of records. Each record starts with a `u32`
//! declaration id followed by fixed little-endian fields:
//!
//! | id | record       | fields                                                    |
//! |----|--------------|-----------------------------------------------------------|
//! | 0  | entity       | guid `u64`                                                |
//! | 1  | event class  | guid `u64`, name guid `u64`                               |
//! | 2  | label        | guid `u64`, byte length `u32`, UTF-8 text                 |
//! | 3  | relationship | type `u32`, guid `u64`, head `u64`, tail `u64`, attribute `u64` |
//! | 4  | event        | guid `u64`, entity guid `u64`, class guid `u64`, timestamp `u64` |

use tracing::{debug, trace};

use super::builder::TimelineDecoder;
use super::records::{
    Entity, Event, EventClass, Label, Relationship, RelationshipType, TimelineRecord,
};
use crate::types::{Packet, PacketBuffer};
use crate::{ProfilingError, Result};

/// Packet family carrying timeline data.
pub const TIMELINE_PACKET_FAMILY: u32 = 1;
/// Packet id of timeline message packets within their family.
pub const TIMELINE_MESSAGE_PACKET_ID: u32 = 1;

/// Declaration ids that prefix each record.
pub mod declaration {
    pub const ENTITY: u32 = 0;
    pub const EVENT_CLASS: u32 = 1;
    pub const LABEL: u32 = 2;
    pub const RELATIONSHIP: u32 = 3;
    pub const EVENT: u32 = 4;
}

/// Bounds-checked little-endian reader over a payload.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.offset;
        if len > remaining {
            return Err(ProfilingError::Parse {
                context: "Timeline record".to_string(),
                details: format!(
                    "Insufficient data for {what} at offset {} (need {len} bytes, have {remaining})",
                    self.offset
                ),
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let bytes = self.take(8, what)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    fn text(&mut self) -> Result<String> {
        let len = self.u32("label length")? as usize;
        let bytes = self.take(len, "label text")?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            ProfilingError::parse_error("Timeline label", format!("label text is not UTF-8: {e}"))
        })
    }
}

/// Decode every record in `payload` into `decoder`, returning how many were read.
///
/// Records the decoder rejects, and relationships with an unknown type code, are left
/// to the decoder's error list and decoding carries on. An unknown declaration id or a
/// truncated record stops decoding with [`ProfilingError::Parse`]; records before it
/// have already been applied.
pub fn decode_records<D>(payload: &[u8], decoder: &mut D) -> Result<usize>
where
    D: TimelineDecoder + ?Sized,
{
    let mut reader = Reader::new(payload);
    let mut count = 0;

    while !reader.is_empty() {
        let declaration_offset = reader.offset;
        // Rejections are already recorded by the decoder
        let _ = match reader.u32("declaration id")? {
            declaration::ENTITY => decoder.create_entity(Entity { guid: reader.u64("entity guid")? }),
            declaration::EVENT_CLASS => decoder.create_event_class(EventClass {
                guid: reader.u64("event class guid")?,
                name_guid: reader.u64("event class name guid")?,
            }),
            declaration::LABEL => {
                let guid = reader.u64("label guid")?;
                decoder.create_label(Label { guid, text: reader.text()? })
            }
            declaration::RELATIONSHIP => {
                let code = reader.u32("relationship type")?;
                let guid = reader.u64("relationship guid")?;
                let head_guid = reader.u64("relationship head")?;
                let tail_guid = reader.u64("relationship tail")?;
                let attribute_guid = reader.u64("relationship attribute")?;

                match RelationshipType::try_from(code) {
                    Ok(relationship_type) => decoder.create_relationship(Relationship {
                        guid,
                        relationship_type,
                        head_guid,
                        tail_guid,
                        attribute_guid,
                    }),
                    Err(unknown) => {
                        decoder.report_malformed(ProfilingError::malformed_record(
                            guid,
                            format!("unknown relationship type {unknown}"),
                        ));
                        Ok(())
                    }
                }
            }
            declaration::EVENT => decoder.create_event(Event {
                guid: reader.u64("event guid")?,
                entity_guid: reader.u64("event entity")?,
                class_guid: reader.u64("event class")?,
                timestamp: reader.u64("event timestamp")?,
            }),
            other => {
                return Err(ProfilingError::parse_error(
                    "Timeline record",
                    format!("unknown declaration id {other} at offset {declaration_offset}"),
                ));
            }
        };
        count += 1;
    }

    trace!(count, bytes = payload.len(), "Decoded timeline records");
    Ok(count)
}

/// Append the wire form of `record` to `out`.
///
/// Label text longer than the 32-bit length word is rejected as a
/// [`ProfilingError::MalformedRecord`] and nothing is written.
pub fn encode_record(record: &TimelineRecord, out: &mut Vec<u8>) -> Result<()> {
    match record {
        TimelineRecord::Entity(entity) => {
            out.extend_from_slice(&declaration::ENTITY.to_le_bytes());
            out.extend_from_slice(&entity.guid.to_le_bytes());
        }
        TimelineRecord::EventClass(class) => {
            out.extend_from_slice(&declaration::EVENT_CLASS.to_le_bytes());
            out.extend_from_slice(&class.guid.to_le_bytes());
            out.extend_from_slice(&class.name_guid.to_le_bytes());
        }
        TimelineRecord::Label(label) => {
            let length = text_length(label.guid, label.text.len())?;
            out.extend_from_slice(&declaration::LABEL.to_le_bytes());
            out.extend_from_slice(&label.guid.to_le_bytes());
            out.extend_from_slice(&length.to_le_bytes());
            out.extend_from_slice(label.text.as_bytes());
        }
        TimelineRecord::Relationship(relationship) => {
            out.extend_from_slice(&declaration::RELATIONSHIP.to_le_bytes());
            out.extend_from_slice(&relationship.relationship_type.code().to_le_bytes());
            for guid in [
                relationship.guid,
                relationship.head_guid,
                relationship.tail_guid,
                relationship.attribute_guid,
            ] {
                out.extend_from_slice(&guid.to_le_bytes());
            }
        }
        TimelineRecord::Event(event) => {
            out.extend_from_slice(&declaration::EVENT.to_le_bytes());
            for field in [event.guid, event.entity_guid, event.class_guid, event.timestamp] {
                out.extend_from_slice(&field.to_le_bytes());
            }
        }
    }
    Ok(())
}

fn text_length(guid: u64, len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| ProfilingError::malformed_record(guid, "label text exceeds u32 length"))
}

/// Encode `records` into a single timeline message packet.
pub fn encode_packet(records: &[TimelineRecord]) -> Result<PacketBuffer> {
    let mut payload = Vec::new();
    for record in records {
        encode_record(record, &mut payload)?;
    }
    debug!(records = records.len(), bytes = payload.len(), "Encoded timeline packet");
    Ok(PacketBuffer::new(
        Packet::header_for(TIMELINE_PACKET_FAMILY, TIMELINE_MESSAGE_PACKET_ID),
        payload,
    ))
}
