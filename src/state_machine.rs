//! Thread-safe profiling session state machine

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::types::ProfilingState;
use crate::{ProfilingError, Result};

/// Owns the single current [`ProfilingState`] of a session.
///
/// Every transition attempt takes the lock, checks the legal-transition table against
/// the state it observes and either commits or rejects without side effects. Committed
/// states are published on a watch channel while the lock is held, so subscribers see
/// them in commit order.
#[derive(Debug)]
pub struct ProfilingStateMachine {
    state: Mutex<ProfilingState>,
    updates: watch::Sender<ProfilingState>,
}

impl ProfilingStateMachine {
    pub fn new(initial: ProfilingState) -> Self {
        let (updates, _) = watch::channel(initial);
        Self { state: Mutex::new(initial), updates }
    }

    /// The latest committed state.
    pub fn current_state(&self) -> ProfilingState {
        *self.lock()
    }

    /// Move to `target`, or fail with [`ProfilingError::InvalidStateTransition`]
    /// leaving the current state untouched.
    pub fn transition_to(&self, target: ProfilingState) -> Result<()> {
        let mut state = self.lock();
        let from = *state;

        if !from.can_transition_to(target) {
            warn!(%from, to = %target, "Rejected profiling state transition");
            return Err(ProfilingError::InvalidStateTransition { from, to: target });
        }

        *state = target;
        if from != target {
            debug!(%from, to = %target, "Profiling state changed");
        }
        self.updates.send_replace(target);
        Ok(())
    }

    /// Receive every committed state, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<ProfilingState> {
        self.updates.subscribe()
    }

    // A poisoned lock still holds a fully committed state, since the guarded value is
    // only ever replaced whole.
    fn lock(&self) -> MutexGuard<'_, ProfilingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
