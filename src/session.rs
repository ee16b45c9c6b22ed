//! A running profiling session: service plus dispatch task

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::driver::{Driver, DriverStats};
use crate::options::ProfilingOptions;
use crate::service::ProfilingService;
use crate::source::PacketSource;
use crate::sources::{CaptureFileWriter, RecordingSource};
use crate::types::ProfilingState;
use crate::{ProfilingError, Result};

/// A profiling service whose inbound packets come from a [`PacketSource`].
///
/// When the options name an `incoming_capture_file`, every inbound packet is also
/// recorded there. Dropping the session cancels its dispatch task.
///
/// ```rust
/// use profwire::{ProfilingOptions, ProfilingSession, ProfilingState};
/// use profwire::sources::ChannelSource;
/// use profwire::types::{Packet, PacketBuffer};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> profwire::Result<()> {
/// let (sender, source) = ChannelSource::new(8);
/// let session = ProfilingSession::start(ProfilingOptions::enabled(), source)?;
/// session.service().update()?;
///
/// sender.send(PacketBuffer::empty(Packet::header_for(0, 1))).await.ok();
/// session.wait_for_state(ProfilingState::Active, Duration::from_secs(1)).await?;
/// # Ok(())
/// # }
/// ```
pub struct ProfilingSession {
    service: Arc<ProfilingService>,
    states: watch::Receiver<ProfilingState>,
    task: Option<tokio::task::JoinHandle<DriverStats>>,
    cancel: CancellationToken,
}

impl ProfilingSession {
    /// Build a service from `options` and start dispatching packets from `source`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S>(options: ProfilingOptions, source: S) -> Result<Self>
    where
        S: PacketSource,
    {
        let service = Arc::new(ProfilingService::new(options)?);
        Self::attach(service, source)
    }

    /// Start dispatching packets from `source` into an existing service.
    ///
    /// Fails with [`ProfilingError::File`] when the incoming capture file cannot be
    /// created.
    pub fn attach<S>(service: Arc<ProfilingService>, source: S) -> Result<Self>
    where
        S: PacketSource,
    {
        let writer = match service.options().incoming_capture_file {
            Some(path) => Some(CaptureFileWriter::create(path)?),
            None => None,
        };
        let source = RecordingSource::new(source, writer);

        let states = service.subscribe();
        let handle = Driver::spawn(source, Arc::clone(&service));
        info!(state = %service.current_state(), "Profiling session started");

        Ok(Self { service, states, task: Some(handle.task), cancel: handle.cancel })
    }

    pub fn service(&self) -> &Arc<ProfilingService> {
        &self.service
    }

    pub fn current_state(&self) -> ProfilingState {
        self.service.current_state()
    }

    /// Every committed state, starting with the current one.
    ///
    /// Intermediate states may be skipped when several commits happen between polls.
    pub fn state_updates(&self) -> impl Stream<Item = ProfilingState> + 'static {
        WatchStream::new(self.states.clone())
    }

    /// Wait until the session reaches `state`, or fail with
    /// [`ProfilingError::Timeout`] after `timeout`.
    pub async fn wait_for_state(&self, state: ProfilingState, timeout: Duration) -> Result<()> {
        let mut updates = std::pin::pin!(self.state_updates().filter(|current| {
            let reached = *current == state;
            async move { reached }
        }));

        match tokio::time::timeout(timeout, updates.next()).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(ProfilingError::connection_failed("state updates closed")),
            Err(_) => Err(ProfilingError::Timeout { duration: timeout }),
        }
    }

    /// Stop the dispatch task and wait for it to finish.
    pub async fn shutdown(self) -> Result<DriverStats> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the dispatch task to finish on its own, which happens once the source
    /// is exhausted or has failed.
    pub async fn join(mut self) -> Result<DriverStats> {
        match self.task.take() {
            Some(task) => task.await.map_err(|e| {
                ProfilingError::connection_failed_with_source("dispatch task failed", Box::new(e))
            }),
            None => Ok(DriverStats::default()),
        }
    }
}

impl Drop for ProfilingSession {
    fn drop(&mut self) {
        debug!("Dropping profiling session");
        self.cancel.cancel();
    }
}
