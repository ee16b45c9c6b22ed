//! Packet source implementations

pub mod capture_file;
pub mod channel;
pub mod recording;

pub use capture_file::{CaptureFileSource, CaptureFileWriter};
pub use channel::{ChannelSender, ChannelSource};
pub use recording::RecordingSource;
