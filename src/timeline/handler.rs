//! Command handler feeding timeline packets into a shared model builder

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use super::builder::TimelineModelBuilder;
use super::codec::{TIMELINE_MESSAGE_PACKET_ID, TIMELINE_PACKET_FAMILY, decode_records};
use crate::command::CommandHandler;
use crate::types::Packet;
use crate::{ProfilingError, Result};

/// Decodes timeline message packets into a [`TimelineModelBuilder`].
///
/// Meant for the consuming side of a connection, registered in its own registry
/// because timeline and control packets share packet ids across families.
#[derive(Debug, Clone)]
pub struct TimelinePacketHandler {
    version: u32,
    builder: Arc<Mutex<TimelineModelBuilder>>,
}

impl TimelinePacketHandler {
    pub fn new(version: u32, builder: Arc<Mutex<TimelineModelBuilder>>) -> Self {
        Self { version, builder }
    }

    /// The builder this handler writes to.
    pub fn builder(&self) -> MutexGuard<'_, TimelineModelBuilder> {
        self.builder.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandHandler for TimelinePacketHandler {
    fn packet_id(&self) -> u32 {
        TIMELINE_MESSAGE_PACKET_ID
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn handle(&self, packet: &Packet<'_>) -> Result<()> {
        if packet.family() != TIMELINE_PACKET_FAMILY {
            return Err(ProfilingError::parse_error(
                "Timeline packet",
                format!("packet family {} is not the timeline family", packet.family()),
            ));
        }

        let records = decode_records(packet.payload(), &mut *self.builder())?;
        debug!(records, "Timeline packet applied");
        Ok(())
    }
}
