//! Error types for profiling protocol processing.
//!
//! This module provides the single error type used across the crate. All errors
//! implement the `std::error::Error` trait and carry structured context for
//! debugging and recovery guidance.
//!
//! ## Error Categories
//!
//! - **Construction Errors**: Packets whose declared length and payload disagree
//! - **Dispatch Errors**: No command handler registered for a packet key
//! - **Session Errors**: Illegal profiling state transitions and commands received in
//!   the wrong state
//! - **Timeline Errors**: Records referencing unknown guids or unknown semantics
//! - **Parse Errors**: Truncated or malformed wire data
//! - **Configuration Errors**: Inconsistent profiling options
//!
//! ## Recovery and Retry
//!
//! Errors provide methods to determine if they are recoverable:
//!
//! ```rust
//! use profwire::ProfilingError;
//!
//! let error = ProfilingError::connection_failed("capture pipe closed");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```
//!
//! ## Helper Constructors
//!
//! ```rust
//! use profwire::ProfilingError;
//!
//! let payload_error = ProfilingError::invalid_payload(0x1C2B_0000, 0, "data supplied for empty packet");
//! let missing = ProfilingError::handler_not_found(4, 4_194_304);
//! let record = ProfilingError::malformed_record(42, "unknown head entity");
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::ProfilingState;

/// Result type alias for profiling operations.
pub type Result<T, E = ProfilingError> = std::result::Result<T, E>;

/// Main error type for profiling operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProfilingError {
    #[error("Invalid payload for packet header {header:#010x} (length {length}): {reason}")]
    InvalidPayload { header: u32, length: u32, reason: String },

    #[error("No command handler registered for packet id {packet_id} version {version}")]
    HandlerNotFound { packet_id: u32, version: u32 },

    #[error("Invalid profiling state transition from {from} to {to}")]
    InvalidStateTransition { from: ProfilingState, to: ProfilingState },

    #[error("{operation} requires the {expected} state, current state is {state}")]
    InvalidState { operation: String, state: ProfilingState, expected: ProfilingState },

    #[error("Malformed timeline record [{guid}]: {reason}")]
    MalformedRecord { guid: u64, reason: String },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Invalid profiling options: {reason}")]
    Config { reason: String },

    #[error("Capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Packet source failed: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ProfilingError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProfilingError::Connection { .. } => true,
            ProfilingError::Timeout { .. } => true,
            ProfilingError::InvalidPayload { .. } => false,
            ProfilingError::HandlerNotFound { .. } => false,
            ProfilingError::InvalidStateTransition { .. } => false,
            ProfilingError::InvalidState { .. } => false,
            ProfilingError::MalformedRecord { .. } => false,
            ProfilingError::Parse { .. } => false,
            ProfilingError::Config { .. } => false,
            ProfilingError::File { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            ProfilingError::InvalidPayload { .. } => vec![
                "Pass no payload when the declared length is zero",
                "Check the framing layer slices payloads to the declared length",
            ],
            ProfilingError::HandlerNotFound { .. } => vec![
                "Register a handler for the packet id and resolved version",
                "Verify the packet version resolver matches the registered versions",
            ],
            ProfilingError::InvalidStateTransition { .. } => vec![
                "Check the current session state before transitioning",
                "Reset the session through NotConnected after a disconnect",
            ],
            ProfilingError::InvalidState { .. } => vec![
                "Wait for the connection acknowledgement before sending session commands",
                "Check the session has not been reset or disconnected",
            ],
            ProfilingError::MalformedRecord { .. } => vec![
                "Declare entities and labels before relationships that reference them",
                "Inspect the model error list for the offending record",
            ],
            ProfilingError::Parse { .. } => vec![
                "Check the payload was produced by a compatible encoder",
                "Verify the capture was not truncated",
            ],
            ProfilingError::Config { .. } => vec![
                "Enable profiling before enabling timeline reporting",
                "Use the binary capture file format",
            ],
            ProfilingError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            ProfilingError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Verify the remote side is still sending packets",
            ],
            ProfilingError::Connection { .. } => vec![
                "Reconnect the packet source",
                "Move the session back to NotConnected and renegotiate",
            ],
        }
    }

    /// Helper constructor for packet construction errors.
    pub fn invalid_payload(header: u32, length: u32, reason: impl Into<String>) -> Self {
        ProfilingError::InvalidPayload { header, length, reason: reason.into() }
    }

    /// Helper constructor for registry lookup misses.
    pub fn handler_not_found(packet_id: u32, version: u32) -> Self {
        ProfilingError::HandlerNotFound { packet_id, version }
    }

    /// Helper constructor for operations attempted in the wrong session state.
    pub fn invalid_state(
        operation: impl Into<String>,
        state: ProfilingState,
        expected: ProfilingState,
    ) -> Self {
        ProfilingError::InvalidState { operation: operation.into(), state, expected }
    }

    /// Helper constructor for timeline ingestion errors.
    pub fn malformed_record(guid: u64, reason: impl Into<String>) -> Self {
        ProfilingError::MalformedRecord { guid, reason: reason.into() }
    }

    /// Helper constructor for wire decode errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        ProfilingError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for option validation errors.
    pub fn config_error(reason: impl Into<String>) -> Self {
        ProfilingError::Config { reason: reason.into() }
    }

    /// Helper constructor for capture file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        ProfilingError::File { path, source }
    }

    /// Helper constructor for packet source errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        ProfilingError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for packet source errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        ProfilingError::Connection { reason: reason.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for ProfilingError {
    fn from(err: std::io::Error) -> Self {
        ProfilingError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
