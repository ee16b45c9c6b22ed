//! Profiling service: ties options, session state, capture configuration and command
//! dispatch together for one profiling session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::command::handlers::{
    ConnectionAcknowledgedHandler, PeriodicCounterSelectionHandler, TimelineReportingHandler,
    packet_ids,
};
use crate::command::{
    CommandHandler, CommandHandlerRegistry, DefaultPacketVersionResolver, PacketVersionResolver,
};
use crate::holder::CaptureConfigHolder;
use crate::options::ProfilingOptions;
use crate::sources::CaptureFileWriter;
use crate::state_machine::ProfilingStateMachine;
use crate::types::{CaptureData, Packet, PacketBuffer, ProfilingState};
use crate::{ProfilingError, Result};

/// Coordinates a single profiling session.
///
/// The service is driven by repeated calls to [`update`](Self::update), each of which
/// moves the session at most one step along
/// `Uninitialised -> NotConnected -> WaitingForAck`. The final step to `Active` happens
/// when the remote side acknowledges the connection, or immediately for file-only
/// sessions. Inbound packets are routed through [`dispatch`](Self::dispatch).
///
/// Packets the session emits go through [`send_packet`](Self::send_packet), which
/// records them in the outgoing capture file.
///
/// Command handlers are keyed by packet id and version only, so a service handles the
/// control packet family. Timeline packets are decoded on the consumer side with
/// [`TimelinePacketHandler`](crate::timeline::TimelinePacketHandler) in a registry of
/// their own.
pub struct ProfilingService {
    options: RwLock<ProfilingOptions>,
    state_machine: Arc<ProfilingStateMachine>,
    capture_config: Arc<CaptureConfigHolder>,
    registry: Arc<CommandHandlerRegistry>,
    resolver: Arc<dyn PacketVersionResolver>,
    timeline_reporting: Arc<AtomicBool>,
    outgoing_capture: Mutex<Option<CaptureFileWriter>>,
}

impl ProfilingService {
    /// Validate `options`, then bring the session up as far as one update allows.
    pub fn new(options: ProfilingOptions) -> Result<Self> {
        Self::with_resolver(options, Arc::new(DefaultPacketVersionResolver))
    }

    /// Like [`new`](Self::new) with a custom version resolver.
    pub fn with_resolver(
        options: ProfilingOptions,
        resolver: Arc<dyn PacketVersionResolver>,
    ) -> Result<Self> {
        options.validate()?;

        let capture_config = CaptureConfigHolder::new();
        capture_config.set_capture_data(options.capture_period, Vec::new());

        let service = Self {
            options: RwLock::new(options),
            state_machine: Arc::new(ProfilingStateMachine::new(ProfilingState::Uninitialised)),
            capture_config: Arc::new(capture_config),
            registry: Arc::new(CommandHandlerRegistry::new()),
            resolver,
            timeline_reporting: Arc::new(AtomicBool::new(false)),
            outgoing_capture: Mutex::new(None),
        };
        service.update()?;
        Ok(service)
    }

    /// Advance the session lifecycle by one step.
    pub fn update(&self) -> Result<()> {
        let options = self.options();
        if !options.enable_profiling {
            trace!("Profiling disabled, nothing to update");
            return Ok(());
        }

        match self.state_machine.current_state() {
            ProfilingState::Uninitialised => {
                self.open_outgoing_capture(&options)?;
                self.register_builtin_handlers(&options);
                self.state_machine.transition_to(ProfilingState::NotConnected)?;
                info!(timeline = options.timeline_enabled, "Profiling service initialised");
            }
            ProfilingState::NotConnected => {
                self.state_machine.transition_to(ProfilingState::WaitingForAck)?;
                if options.file_only {
                    // Nobody is listening on the other end; acknowledge ourselves
                    self.state_machine.transition_to(ProfilingState::Active)?;
                    info!("File-only profiling session active");
                } else {
                    info!("Waiting for connection acknowledgement");
                }
            }
            ProfilingState::WaitingForAck | ProfilingState::Active => {}
        }
        Ok(())
    }

    /// Route `packet` to the handler registered for its id and resolved version.
    pub fn dispatch(&self, packet: &Packet<'_>) -> Result<()> {
        let packet_id = packet.packet_id();
        let version = self.resolver.resolve_packet_version(packet_id);
        trace!(packet_id, %version, length = packet.length(), "Dispatching packet");

        self.registry.get_handler(packet_id, version.encoded())?.handle(packet)
    }

    /// Replace the session options.
    ///
    /// The capture configuration goes back to the configured period with no counters,
    /// and the registered handlers and outgoing capture file follow the new options.
    /// An active session drops back to `NotConnected` so the next updates renegotiate
    /// with the new settings.
    pub fn reset_options(&self, options: ProfilingOptions) -> Result<()> {
        options.validate()?;
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options.clone();
        debug!(?options, "Profiling options replaced");
        self.capture_config.set_capture_data(options.capture_period, Vec::new());

        let state = self.state_machine.current_state();
        if state != ProfilingState::Uninitialised && options.enable_profiling {
            self.open_outgoing_capture(&options)?;
            self.register_builtin_handlers(&options);
        } else {
            self.close_outgoing_capture();
        }
        if state == ProfilingState::Active {
            self.state_machine.transition_to(ProfilingState::NotConnected)?;
            self.timeline_reporting.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    /// Report that the transport to the remote side was lost.
    pub fn disconnect(&self) -> Result<()> {
        self.state_machine.transition_to(ProfilingState::NotConnected)?;
        self.timeline_reporting.store(false, Ordering::SeqCst);
        warn!("Profiling connection lost");
        Ok(())
    }

    /// Emit a packet from this session.
    ///
    /// The session must be `Active`. The packet is appended to the outgoing capture
    /// file; forwarding it to a live consumer is up to the transport.
    pub fn send_packet(&self, packet: &PacketBuffer) -> Result<()> {
        let state = self.state_machine.current_state();
        if state != ProfilingState::Active {
            return Err(ProfilingError::invalid_state(
                "Sending a packet",
                state,
                ProfilingState::Active,
            ));
        }

        let mut outgoing = self.outgoing_capture.lock().unwrap_or_else(PoisonError::into_inner);
        match outgoing.as_mut() {
            Some(writer) => writer.write_packet(packet),
            None => Err(ProfilingError::config_error("no outgoing capture file configured")),
        }
    }

    /// Register an additional handler under its own key.
    pub fn register_handler(&self, handler: Arc<dyn CommandHandler>) {
        self.registry.register(handler);
    }

    pub fn current_state(&self) -> ProfilingState {
        self.state_machine.current_state()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfilingState> {
        self.state_machine.subscribe()
    }

    pub fn options(&self) -> ProfilingOptions {
        self.options.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot of the counter capture configuration.
    pub fn capture_data(&self) -> CaptureData {
        self.capture_config.get_capture_data()
    }

    pub fn is_timeline_reporting_enabled(&self) -> bool {
        self.timeline_reporting.load(Ordering::SeqCst)
    }

    pub fn state_machine(&self) -> &Arc<ProfilingStateMachine> {
        &self.state_machine
    }

    pub fn capture_config(&self) -> &Arc<CaptureConfigHolder> {
        &self.capture_config
    }

    pub fn registry(&self) -> &Arc<CommandHandlerRegistry> {
        &self.registry
    }

    fn version_for(&self, packet_id: u32) -> u32 {
        self.resolver.resolve_packet_version(packet_id).encoded()
    }

    fn open_outgoing_capture(&self, options: &ProfilingOptions) -> Result<()> {
        let writer = match &options.outgoing_capture_file {
            Some(path) => Some(CaptureFileWriter::create(path)?),
            None => None,
        };
        *self.outgoing_capture.lock().unwrap_or_else(PoisonError::into_inner) = writer;
        Ok(())
    }

    fn close_outgoing_capture(&self) {
        self.outgoing_capture.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn register_builtin_handlers(&self, options: &ProfilingOptions) {
        let machine = &self.state_machine;

        self.registry.register(Arc::new(ConnectionAcknowledgedHandler::new(
            self.version_for(packet_ids::CONNECTION_ACKNOWLEDGED),
            Arc::clone(machine),
        )));
        self.registry.register(Arc::new(PeriodicCounterSelectionHandler::new(
            self.version_for(packet_ids::PERIODIC_COUNTER_SELECTION),
            Arc::clone(machine),
            Arc::clone(&self.capture_config),
        )));

        if options.timeline_enabled {
            self.registry.register(Arc::new(TimelineReportingHandler::activate(
                self.version_for(packet_ids::ACTIVATE_TIMELINE_REPORTING),
                Arc::clone(machine),
                Arc::clone(&self.timeline_reporting),
            )));
            self.registry.register(Arc::new(TimelineReportingHandler::deactivate(
                self.version_for(packet_ids::DEACTIVATE_TIMELINE_REPORTING),
                Arc::clone(machine),
                Arc::clone(&self.timeline_reporting),
            )));
        } else {
            for packet_id in [
                packet_ids::ACTIVATE_TIMELINE_REPORTING,
                packet_ids::DEACTIVATE_TIMELINE_REPORTING,
            ] {
                self.registry.unregister_handler(packet_id, self.version_for(packet_id));
            }
            self.timeline_reporting.store(false, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for ProfilingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfilingService")
            .field("state", &self.current_state())
            .field("options", &self.options())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProfilingError;
    use crate::command::handlers::{CONTROL_PACKET_FAMILY, LOWEST_CAPTURE_PERIOD};
    use crate::types::Version;

    fn control_packet(packet_id: u32) -> Packet<'static> {
        Packet::new(Packet::header_for(CONTROL_PACKET_FAMILY, packet_id), 0, None).unwrap()
    }

    #[test]
    fn disabled_service_stays_uninitialised() {
        let service = ProfilingService::new(ProfilingOptions::default()).unwrap();
        assert_eq!(service.current_state(), ProfilingState::Uninitialised);

        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::Uninitialised);
        assert!(service.registry().is_empty());
    }

    #[test]
    fn enabled_service_reaches_waiting_for_ack() {
        let service = ProfilingService::new(ProfilingOptions::enabled()).unwrap();
        assert_eq!(service.current_state(), ProfilingState::NotConnected);

        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::WaitingForAck);

        // Waiting is stable until an acknowledgement arrives
        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::WaitingForAck);
    }

    #[test]
    fn enabling_at_runtime_starts_the_lifecycle() {
        let service = ProfilingService::new(ProfilingOptions::default()).unwrap();
        assert_eq!(service.current_state(), ProfilingState::Uninitialised);

        service.reset_options(ProfilingOptions::enabled()).unwrap();
        assert_eq!(service.current_state(), ProfilingState::Uninitialised);

        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::NotConnected);

        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::WaitingForAck);
    }

    #[test]
    fn acknowledgement_packet_activates_session() {
        let service = ProfilingService::new(ProfilingOptions::enabled()).unwrap();
        service.update().unwrap();

        service.dispatch(&control_packet(packet_ids::CONNECTION_ACKNOWLEDGED)).unwrap();
        assert_eq!(service.current_state(), ProfilingState::Active);
    }

    #[test]
    fn file_only_session_acknowledges_itself() {
        let options = ProfilingOptions { file_only: true, ..ProfilingOptions::enabled() };
        let service = ProfilingService::new(options).unwrap();

        let mut updates = service.subscribe();
        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::Active);
        assert_eq!(*updates.borrow_and_update(), ProfilingState::Active);
    }

    #[test]
    fn counter_selection_reaches_capture_config() {
        let options = ProfilingOptions { file_only: true, ..ProfilingOptions::enabled() };
        let service = ProfilingService::new(options).unwrap();
        service.update().unwrap();

        let payload = PeriodicCounterSelectionHandler::encode_selection(50, &[1, 2, 3]);
        let header = Packet::header_for(CONTROL_PACKET_FAMILY, packet_ids::PERIODIC_COUNTER_SELECTION);
        let packet = Packet::new(header, payload.len() as u32, Some(&payload[..])).unwrap();
        service.dispatch(&packet).unwrap();

        let data = service.capture_data();
        assert_eq!(data.capture_period(), LOWEST_CAPTURE_PERIOD);
        assert_eq!(data.counter_ids(), &[1, 2, 3]);
    }

    #[test]
    fn timeline_handlers_follow_options() {
        let plain = ProfilingService::new(ProfilingOptions::enabled()).unwrap();
        assert!(matches!(
            plain.dispatch(&control_packet(packet_ids::ACTIVATE_TIMELINE_REPORTING)),
            Err(ProfilingError::HandlerNotFound { packet_id: 6, .. })
        ));

        let options = ProfilingOptions {
            timeline_enabled: true,
            file_only: true,
            ..ProfilingOptions::enabled()
        };
        let service = ProfilingService::new(options).unwrap();
        service.update().unwrap();

        service.dispatch(&control_packet(packet_ids::ACTIVATE_TIMELINE_REPORTING)).unwrap();
        assert!(service.is_timeline_reporting_enabled());
        service.dispatch(&control_packet(packet_ids::DEACTIVATE_TIMELINE_REPORTING)).unwrap();
        assert!(!service.is_timeline_reporting_enabled());
    }

    #[test]
    fn dispatch_uses_resolved_version() {
        struct FixedResolver;
        impl PacketVersionResolver for FixedResolver {
            fn resolve_packet_version(&self, _packet_id: u32) -> Version {
                Version::new(2, 1, 0)
            }
        }

        let service =
            ProfilingService::with_resolver(ProfilingOptions::enabled(), Arc::new(FixedResolver))
                .unwrap();
        let keys = service.registry().keys();
        assert!(keys.iter().all(|key| key.version() == Version::new(2, 1, 0).encoded()));

        service.update().unwrap();
        service.dispatch(&control_packet(packet_ids::CONNECTION_ACKNOWLEDGED)).unwrap();
        assert_eq!(service.current_state(), ProfilingState::Active);
    }

    #[test]
    fn reset_options_drops_active_session_to_not_connected() {
        let options = ProfilingOptions { file_only: true, ..ProfilingOptions::enabled() };
        let service = ProfilingService::new(options.clone()).unwrap();
        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::Active);

        service.reset_options(options).unwrap();
        assert_eq!(service.current_state(), ProfilingState::NotConnected);

        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::Active);
    }

    #[test]
    fn reset_without_timeline_removes_reporting_handlers() {
        let options = ProfilingOptions {
            timeline_enabled: true,
            file_only: true,
            ..ProfilingOptions::enabled()
        };
        let service = ProfilingService::new(options).unwrap();
        service.update().unwrap();
        service.dispatch(&control_packet(packet_ids::ACTIVATE_TIMELINE_REPORTING)).unwrap();
        assert!(service.is_timeline_reporting_enabled());

        let plain = ProfilingOptions { file_only: true, ..ProfilingOptions::enabled() };
        service.reset_options(plain).unwrap();
        service.update().unwrap();
        assert_eq!(service.current_state(), ProfilingState::Active);

        for packet_id in
            [packet_ids::ACTIVATE_TIMELINE_REPORTING, packet_ids::DEACTIVATE_TIMELINE_REPORTING]
        {
            assert!(matches!(
                service.dispatch(&control_packet(packet_id)),
                Err(ProfilingError::HandlerNotFound { .. })
            ));
        }
        assert!(!service.is_timeline_reporting_enabled());
        assert_eq!(service.registry().len(), 2);
    }

    #[test]
    fn configured_capture_period_seeds_capture_config() {
        let options = ProfilingOptions {
            capture_period: 50_000,
            file_only: true,
            ..ProfilingOptions::enabled()
        };
        let service = ProfilingService::new(options).unwrap();
        service.update().unwrap();

        let data = service.capture_data();
        assert_eq!(data.capture_period(), 50_000);
        assert!(data.counter_ids().is_empty());

        let payload = PeriodicCounterSelectionHandler::encode_selection(20_000, &[3]);
        let header = Packet::header_for(CONTROL_PACKET_FAMILY, packet_ids::PERIODIC_COUNTER_SELECTION);
        let packet = Packet::new(header, payload.len() as u32, Some(&payload[..])).unwrap();
        service.dispatch(&packet).unwrap();
        assert_eq!(service.capture_data().capture_period(), 20_000);

        let slower = ProfilingOptions { capture_period: 80_000, ..ProfilingOptions::enabled() };
        service.reset_options(slower).unwrap();
        assert_eq!(service.capture_data(), CaptureData::new(80_000, Vec::new()));
    }

    #[test]
    fn sent_packets_land_in_outgoing_capture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outgoing.bin");
        let options = ProfilingOptions {
            file_only: true,
            outgoing_capture_file: Some(path.clone()),
            ..ProfilingOptions::enabled()
        };
        let service = ProfilingService::new(options).unwrap();
        let packet = PacketBuffer::new(Packet::header_for(1, 1), vec![0, 0, 0, 0, 1, 0, 0, 0]);

        // Not active yet
        assert!(matches!(
            service.send_packet(&packet),
            Err(ProfilingError::InvalidState { state: ProfilingState::NotConnected, .. })
        ));

        service.update().unwrap();
        service.send_packet(&packet).unwrap();
        service.send_packet(&packet).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let (first, consumed) = Packet::parse_frame(&bytes).unwrap();
        assert_eq!(first.to_buffer(), packet);
        assert_eq!(bytes.len(), consumed * 2);
    }

    #[test]
    fn sending_without_outgoing_capture_is_config_error() {
        let options = ProfilingOptions { file_only: true, ..ProfilingOptions::enabled() };
        let service = ProfilingService::new(options).unwrap();
        service.update().unwrap();

        let result = service.send_packet(&PacketBuffer::empty(Packet::header_for(1, 1)));
        assert!(matches!(result, Err(ProfilingError::Config { .. })));
    }

    #[test]
    fn unwritable_outgoing_capture_fails_initialisation() {
        let dir = tempfile::tempdir().unwrap();
        let options = ProfilingOptions {
            outgoing_capture_file: Some(dir.path().join("missing").join("outgoing.bin")),
            ..ProfilingOptions::enabled()
        };
        assert!(matches!(ProfilingService::new(options), Err(ProfilingError::File { .. })));
    }

    #[test]
    fn disconnect_only_from_active() {
        let service = ProfilingService::new(ProfilingOptions::enabled()).unwrap();
        service.update().unwrap();
        assert!(matches!(
            service.disconnect(),
            Err(ProfilingError::InvalidStateTransition { .. })
        ));

        service.dispatch(&control_packet(packet_ids::CONNECTION_ACKNOWLEDGED)).unwrap();
        service.disconnect().unwrap();
        assert_eq!(service.current_state(), ProfilingState::NotConnected);
    }

    #[test]
    fn invalid_options_are_rejected_up_front() {
        let options = ProfilingOptions { timeline_enabled: true, ..ProfilingOptions::default() };
        assert!(matches!(ProfilingService::new(options), Err(ProfilingError::Config { .. })));

        let service = ProfilingService::new(ProfilingOptions::default()).unwrap();
        let bad = ProfilingOptions { file_format: "csv".into(), ..ProfilingOptions::enabled() };
        assert!(service.reset_options(bad).is_err());
        assert!(!service.options().enable_profiling);
    }
}
