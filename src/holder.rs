//! Shared holder for the live counter capture configuration

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::types::CaptureData;

/// Holds the [`CaptureData`] written by the command path and read by the send path.
///
/// Writes replace the whole value under the lock and reads clone it under the same
/// lock, so a reader never pairs one writer's period with another writer's counters.
#[derive(Debug, Default)]
pub struct CaptureConfigHolder {
    capture_data: Mutex<CaptureData>,
}

impl CaptureConfigHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held configuration.
    pub fn set_capture_data(&self, capture_period: u32, counter_ids: Vec<u16>) {
        debug!(capture_period, counters = counter_ids.len(), "Updating capture data");
        *self.lock() = CaptureData::new(capture_period, counter_ids);
    }

    /// A consistent snapshot of the held configuration.
    pub fn get_capture_data(&self) -> CaptureData {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, CaptureData> {
        self.capture_data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
