//! Packet protocol, session state and timeline model for on-device inference profiling.
//!
//! `profwire` carries the profiling side of an inference runtime: it frames packets,
//! routes them to command handlers, tracks the connection lifecycle of a profiling
//! session and rebuilds timeline records into a graph of layers, workloads and their
//! executions.
//!
//! # Features
//!
//! - **Packet framing**: version and header bit layouts, borrowed [`Packet`] views and
//!   owned [`PacketBuffer`]s
//! - **Command dispatch**: handlers keyed by packet id and resolved protocol version
//! - **Session lifecycle**: a thread-safe state machine with a fixed transition table
//! - **Timeline model**: deterministic text and JSON renderings of timeline records
//! - **Async sources**: a tokio dispatch task fed by channels or capture files
//!
//! ## Example
//!
//! ```rust
//! use profwire::{ProfilingOptions, ProfilingService, ProfilingState};
//! use profwire::types::Packet;
//!
//! let service = ProfilingService::new(ProfilingOptions::enabled())?;
//! assert_eq!(service.current_state(), ProfilingState::NotConnected);
//!
//! service.update()?;
//! assert_eq!(service.current_state(), ProfilingState::WaitingForAck);
//!
//! // Connection acknowledged packet: family 0, packet id 1
//! let ack = Packet::new(Packet::header_for(0, 1), 0, None)?;
//! service.dispatch(&ack)?;
//! assert_eq!(service.current_state(), ProfilingState::Active);
//! # Ok::<(), profwire::ProfilingError>(())
//! ```

// Core types and error handling
mod error;
pub mod holder;
pub mod options;
pub mod state_machine;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Dispatch and session coordination
pub mod command;
pub mod service;

// Timeline reconstruction
pub mod timeline;

// Stream-based packet intake
pub mod driver;
pub mod session;
pub mod source;
pub mod sources;

pub use error::*;
pub use types::*;

pub use command::{CommandHandler, CommandHandlerKey, CommandHandlerRegistry};
pub use holder::CaptureConfigHolder;
pub use options::ProfilingOptions;
pub use service::ProfilingService;
pub use session::ProfilingSession;
pub use source::PacketSource;
pub use state_machine::ProfilingStateMachine;
pub use timeline::{Model, TimelineModelBuilder};
