//! Built-in handlers for the control packet family

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::CommandHandler;
use crate::holder::CaptureConfigHolder;
use crate::state_machine::ProfilingStateMachine;
use crate::types::{Packet, ProfilingState};
use crate::{ProfilingError, Result};

/// Packet family carrying session control packets.
pub const CONTROL_PACKET_FAMILY: u32 = 0;

/// Packet ids within the control family.
pub mod packet_ids {
    pub const STREAM_METADATA: u32 = 0;
    pub const CONNECTION_ACKNOWLEDGED: u32 = 1;
    pub const PERIODIC_COUNTER_SELECTION: u32 = 4;
    pub const ACTIVATE_TIMELINE_REPORTING: u32 = 6;
    pub const DEACTIVATE_TIMELINE_REPORTING: u32 = 7;
}

/// Smallest non-zero capture period accepted from the remote side, in microseconds.
pub const LOWEST_CAPTURE_PERIOD: u32 = 10_000;

fn require_active(state_machine: &ProfilingStateMachine, packet: &str) -> Result<()> {
    match state_machine.current_state() {
        ProfilingState::Active => Ok(()),
        state => Err(ProfilingError::invalid_state(packet, state, ProfilingState::Active)),
    }
}

/// Completes the handshake: `WaitingForAck -> Active`.
#[derive(Debug)]
pub struct ConnectionAcknowledgedHandler {
    version: u32,
    state_machine: Arc<ProfilingStateMachine>,
}

impl ConnectionAcknowledgedHandler {
    pub fn new(version: u32, state_machine: Arc<ProfilingStateMachine>) -> Self {
        Self { version, state_machine }
    }
}

impl CommandHandler for ConnectionAcknowledgedHandler {
    fn packet_id(&self) -> u32 {
        packet_ids::CONNECTION_ACKNOWLEDGED
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn handle(&self, _packet: &Packet<'_>) -> Result<()> {
        self.state_machine.transition_to(ProfilingState::Active)?;
        info!("Connection acknowledged, profiling session active");
        Ok(())
    }
}

/// Applies a counter selection to the capture holder.
///
/// Payload: `u32` capture period followed by any number of `u16` counter ids, all
/// little-endian. An empty payload stops periodic capture.
#[derive(Debug)]
pub struct PeriodicCounterSelectionHandler {
    version: u32,
    state_machine: Arc<ProfilingStateMachine>,
    holder: Arc<CaptureConfigHolder>,
}

impl PeriodicCounterSelectionHandler {
    pub fn new(
        version: u32,
        state_machine: Arc<ProfilingStateMachine>,
        holder: Arc<CaptureConfigHolder>,
    ) -> Self {
        Self { version, state_machine, holder }
    }

    /// Decode a selection payload into `(capture period, counter ids)`.
    pub fn decode_selection(payload: &[u8]) -> Result<(u32, Vec<u16>)> {
        if payload.is_empty() {
            return Ok((0, Vec::new()));
        }

        let Some((period, ids)) = payload.split_first_chunk::<4>() else {
            return Err(ProfilingError::parse_error(
                "Periodic counter selection",
                format!("payload of {} bytes is too short for a capture period", payload.len()),
            ));
        };
        if ids.len() % 2 != 0 {
            return Err(ProfilingError::parse_error(
                "Periodic counter selection",
                format!("{} trailing counter id bytes is not a whole number of ids", ids.len()),
            ));
        }

        let period = u32::from_le_bytes(*period);
        let ids = ids.chunks_exact(2).map(|id| u16::from_le_bytes([id[0], id[1]])).collect();
        Ok((period, ids))
    }

    /// Encode a selection payload, the inverse of [`Self::decode_selection`].
    pub fn encode_selection(capture_period: u32, counter_ids: &[u16]) -> Vec<u8> {
        let mut payload = Vec::with_capacity(4 + counter_ids.len() * 2);
        payload.extend_from_slice(&capture_period.to_le_bytes());
        for id in counter_ids {
            payload.extend_from_slice(&id.to_le_bytes());
        }
        payload
    }
}

impl CommandHandler for PeriodicCounterSelectionHandler {
    fn packet_id(&self) -> u32 {
        packet_ids::PERIODIC_COUNTER_SELECTION
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn handle(&self, packet: &Packet<'_>) -> Result<()> {
        require_active(&self.state_machine, "Periodic counter selection")?;

        let (mut period, counter_ids) = Self::decode_selection(packet.payload())?;
        if period != 0 && period < LOWEST_CAPTURE_PERIOD {
            debug!(requested = period, applied = LOWEST_CAPTURE_PERIOD, "Raising capture period");
            period = LOWEST_CAPTURE_PERIOD;
        }

        self.holder.set_capture_data(period, counter_ids);
        Ok(())
    }
}

/// Switches timeline reporting on or off.
#[derive(Debug)]
pub struct TimelineReportingHandler {
    packet_id: u32,
    version: u32,
    enable: bool,
    state_machine: Arc<ProfilingStateMachine>,
    reporting: Arc<AtomicBool>,
}

impl TimelineReportingHandler {
    /// Handler for the activate packet.
    pub fn activate(
        version: u32,
        state_machine: Arc<ProfilingStateMachine>,
        reporting: Arc<AtomicBool>,
    ) -> Self {
        Self {
            packet_id: packet_ids::ACTIVATE_TIMELINE_REPORTING,
            version,
            enable: true,
            state_machine,
            reporting,
        }
    }

    /// Handler for the deactivate packet.
    pub fn deactivate(
        version: u32,
        state_machine: Arc<ProfilingStateMachine>,
        reporting: Arc<AtomicBool>,
    ) -> Self {
        Self {
            packet_id: packet_ids::DEACTIVATE_TIMELINE_REPORTING,
            version,
            enable: false,
            state_machine,
            reporting,
        }
    }
}

impl CommandHandler for TimelineReportingHandler {
    fn packet_id(&self) -> u32 {
        self.packet_id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn handle(&self, _packet: &Packet<'_>) -> Result<()> {
        require_active(&self.state_machine, "Timeline reporting")?;

        let was = self.reporting.swap(self.enable, Ordering::SeqCst);
        if was != self.enable {
            info!(enabled = self.enable, "Timeline reporting toggled");
        }
        Ok(())
    }
}
