//! Profiling session states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a profiling session.
///
/// Forward progress is strictly linear (`Uninitialised -> NotConnected -> WaitingForAck
/// -> Active`). The only regression is `Active -> NotConnected`, taken when the external
/// side drops and the session has to renegotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProfilingState {
    Uninitialised,
    NotConnected,
    WaitingForAck,
    Active,
}

impl ProfilingState {
    /// All states, in forward order.
    pub const ALL: [ProfilingState; 4] = [
        ProfilingState::Uninitialised,
        ProfilingState::NotConnected,
        ProfilingState::WaitingForAck,
        ProfilingState::Active,
    ];

    /// Whether the session may move from `self` to `target`.
    pub const fn can_transition_to(self, target: ProfilingState) -> bool {
        use ProfilingState::*;

        matches!(
            (self, target),
            (Uninitialised, Uninitialised | NotConnected)
                | (NotConnected, NotConnected | WaitingForAck)
                | (WaitingForAck, WaitingForAck | Active)
                | (Active, Active | NotConnected)
        )
    }
}

impl fmt::Display for ProfilingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProfilingState::Uninitialised => "Uninitialised",
            ProfilingState::NotConnected => "NotConnected",
            ProfilingState::WaitingForAck => "WaitingForAck",
            ProfilingState::Active => "Active",
        };
        f.write_str(name)
    }
}
