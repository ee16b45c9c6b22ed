//! Driver spawns and manages the command dispatch task

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::ProfilingError;
use crate::service::ProfilingService;
use crate::source::PacketSource;
use crate::types::ProfilingState;

/// Consecutive source errors tolerated before the driver gives up.
pub const MAX_SOURCE_ERRORS: u32 = 10;

/// Counters reported when the dispatch task ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub packets: u64,
    pub dispatched: u64,
    pub dispatch_failures: u64,
    pub source_errors: u64,
}

/// Handles to a running dispatch task.
pub struct DriverHandle {
    pub task: JoinHandle<DriverStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

/// Spawns the task that pulls packets from a [`PacketSource`] and dispatches them
/// through a [`ProfilingService`].
pub struct Driver;

impl Driver {
    pub fn spawn<S>(source: S, service: Arc<ProfilingService>) -> DriverHandle
    where
        S: PacketSource,
    {
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move { Self::dispatch_task(source, service, cancel_task).await });

        DriverHandle { task, cancel }
    }

    async fn dispatch_task<S>(
        mut source: S,
        service: Arc<ProfilingService>,
        cancel: CancellationToken,
    ) -> DriverStats
    where
        S: PacketSource,
    {
        info!("Dispatch task started");
        let mut stats = DriverStats::default();
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Dispatch task cancelled");
                    break;
                }
                result = source.next_packet() => result,
            };

            match result {
                Ok(Some(buffer)) => {
                    stats.packets += 1;
                    error_count = 0;

                    let outcome = buffer.as_packet().and_then(|packet| {
                        trace!(packet = stats.packets, packet_id = packet.packet_id(), "Dispatching");
                        service.dispatch(&packet)
                    });
                    match outcome {
                        Ok(()) => stats.dispatched += 1,
                        Err(e @ ProfilingError::HandlerNotFound { .. }) => {
                            stats.dispatch_failures += 1;
                            debug!("Dropping packet: {e}");
                        }
                        Err(e) => {
                            stats.dispatch_failures += 1;
                            warn!("Packet {} rejected: {e}", stats.packets);
                        }
                    }
                }
                Ok(None) => {
                    info!("Packet source ended after {} packets", stats.packets);
                    Self::disconnect_if_active(&service);
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    stats.source_errors += 1;
                    error!("Packet source error ({}/{}): {}", error_count, MAX_SOURCE_ERRORS, e);

                    if error_count >= MAX_SOURCE_ERRORS || !e.is_retryable() {
                        error!("Packet source failed, shutting down");
                        Self::disconnect_if_active(&service);
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(
            packets = stats.packets,
            dispatched = stats.dispatched,
            failures = stats.dispatch_failures,
            "Dispatch task ended"
        );
        stats
    }

    fn disconnect_if_active(service: &ProfilingService) {
        if service.current_state() == ProfilingState::Active {
            if let Err(e) = service.disconnect() {
                warn!("Failed to mark session disconnected: {e}");
            }
        }
    }
}
