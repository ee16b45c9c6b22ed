//! Periodic counter capture configuration

use serde::{Deserialize, Serialize};

/// Which counters to sample and how often.
///
/// Counter ids keep their order and may repeat; the sampler reads them as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureData {
    /// Sampling interval, in microseconds. Zero disables periodic capture.
    capture_period: u32,
    /// Counters to sample on each period
    counter_ids: Vec<u16>,
}

impl CaptureData {
    pub fn new(capture_period: u32, counter_ids: Vec<u16>) -> Self {
        Self { capture_period, counter_ids }
    }

    pub fn capture_period(&self) -> u32 {
        self.capture_period
    }

    pub fn counter_ids(&self) -> &[u16] {
        &self.counter_ids
    }

    pub fn set_capture_period(&mut self, capture_period: u32) {
        self.capture_period = capture_period;
    }

    pub fn set_counter_ids(&mut self, counter_ids: Vec<u16>) {
        self.counter_ids = counter_ids;
    }

    /// Whether periodic capture is switched on.
    pub fn is_capturing(&self) -> bool {
        self.capture_period > 0 && !self.counter_ids.is_empty()
    }
}
