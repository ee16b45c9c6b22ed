//! Capture files: concatenated packet frames, replayed as a source or recorded as a dump

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace, warn};

use crate::source::PacketSource;
use crate::types::{Packet, PacketBuffer};
use crate::{ProfilingError, Result};

/// Replays a file of concatenated packet frames.
///
/// The whole file is read when the source is opened. A frame that cannot be parsed is
/// reported once and ends the replay, since nothing after it can be trusted to start
/// on a frame boundary.
pub struct CaptureFileSource {
    path: PathBuf,
    bytes: Vec<u8>,
    offset: usize,
    packets: u64,
    pacing: Option<Interval>,
}

impl CaptureFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes =
            std::fs::read(&path).map_err(|source| ProfilingError::file_error(path.clone(), source))?;
        info!(path = %path.display(), bytes = bytes.len(), "Opened capture file");
        Ok(Self { path, bytes, offset: 0, packets: 0, pacing: None })
    }

    /// Deliver at most one packet per `period` instead of as fast as possible.
    pub fn with_pacing(mut self, period: Duration) -> Self {
        let mut pacing = interval(period);
        pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.pacing = Some(pacing);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes not yet replayed.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}

impl std::fmt::Debug for CaptureFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFileSource")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl PacketSource for CaptureFileSource {
    async fn next_packet(&mut self) -> Result<Option<PacketBuffer>> {
        if self.remaining() == 0 {
            debug!(packets = self.packets, "Reached end of capture file");
            return Ok(None);
        }

        if let Some(pacing) = &mut self.pacing {
            pacing.tick().await;
        }

        let (packet, consumed) = match Packet::parse_frame(&self.bytes[self.offset..]) {
            Ok((packet, consumed)) => (packet.to_buffer(), consumed),
            Err(e) => {
                warn!(offset = self.offset, path = %self.path.display(), "Corrupt capture frame");
                self.offset = self.bytes.len();
                return Err(e);
            }
        };

        self.offset += consumed;
        self.packets += 1;
        trace!(packet = self.packets, header = packet.header(), "Replayed packet");
        Ok(Some(packet))
    }
}

/// Appends packet frames to a capture file that [`CaptureFileSource`] can replay.
///
/// The file is created or truncated on open. Every packet is flushed as it is
/// written so a dump stays readable if the session dies.
pub struct CaptureFileWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    packets: u64,
}

impl CaptureFileWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::create(&path).map_err(|source| ProfilingError::file_error(path.clone(), source))?;
        info!(path = %path.display(), "Recording capture file");
        Ok(Self { path, writer: BufWriter::new(file), packets: 0 })
    }

    pub fn write_packet(&mut self, packet: &PacketBuffer) -> Result<()> {
        let frame = packet.encode()?;
        self.writer
            .write_all(&frame)
            .and_then(|()| self.writer.flush())
            .map_err(|source| ProfilingError::file_error(self.path.clone(), source))?;
        self.packets += 1;
        trace!(packet = self.packets, header = packet.header(), "Recorded packet");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Packets written so far.
    pub fn packets(&self) -> u64 {
        self.packets
    }
}

impl std::fmt::Debug for CaptureFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFileWriter")
            .field("path", &self.path)
            .field("packets", &self.packets)
            .finish_non_exhaustive()
    }
}
