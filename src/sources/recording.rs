//! Source adapter that dumps inbound packets to a capture file

use tracing::warn;

use super::capture_file::CaptureFileWriter;
use crate::Result;
use crate::source::PacketSource;
use crate::types::PacketBuffer;

/// Passes packets through from `S`, writing each one to a capture file on the way.
///
/// A failed write stops the recording but not the session.
#[derive(Debug)]
pub struct RecordingSource<S> {
    inner: S,
    writer: Option<CaptureFileWriter>,
}

impl<S: PacketSource> RecordingSource<S> {
    pub fn new(inner: S, writer: Option<CaptureFileWriter>) -> Self {
        Self { inner, writer }
    }

    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait::async_trait]
impl<S: PacketSource> PacketSource for RecordingSource<S> {
    async fn next_packet(&mut self) -> Result<Option<PacketBuffer>> {
        let packet = self.inner.next_packet().await?;

        let failed = match (&packet, self.writer.as_mut()) {
            (Some(packet), Some(writer)) => writer.write_packet(packet).err(),
            _ => None,
        };
        if let Some(e) = failed {
            warn!("Stopped recording incoming packets: {e}");
            self.writer = None;
        }
        Ok(packet)
    }
}
