//! Profiling session options

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ProfilingError, Result};

/// The only capture file format currently understood.
pub const BINARY_FILE_FORMAT: &str = "binary";

/// Default counter capture period in microseconds.
pub const DEFAULT_CAPTURE_PERIOD: u32 = 10_000;

/// Options that decide which handlers a session registers and how far it drives the
/// connection handshake.
///
/// Every field is optional in YAML; missing fields take their defaults.
///
/// ```rust
/// use profwire::ProfilingOptions;
///
/// let options = ProfilingOptions::from_yaml("enable_profiling: true\ncapture_period: 5000\n")?;
/// assert!(options.enable_profiling);
/// assert!(!options.timeline_enabled);
/// assert_eq!(options.capture_period, 5000);
/// # Ok::<(), profwire::ProfilingError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingOptions {
    pub enable_profiling: bool,
    pub timeline_enabled: bool,
    /// Write captures to file instead of waiting for a remote consumer.
    pub file_only: bool,
    /// Counter capture period in microseconds.
    pub capture_period: u32,
    /// Packets the session sends are recorded here.
    pub outgoing_capture_file: Option<PathBuf>,
    /// Packets the session receives are recorded here.
    pub incoming_capture_file: Option<PathBuf>,
    pub file_format: String,
}

impl Default for ProfilingOptions {
    fn default() -> Self {
        Self {
            enable_profiling: false,
            timeline_enabled: false,
            file_only: false,
            capture_period: DEFAULT_CAPTURE_PERIOD,
            outgoing_capture_file: None,
            incoming_capture_file: None,
            file_format: BINARY_FILE_FORMAT.to_string(),
        }
    }
}

impl ProfilingOptions {
    /// Profiling enabled with everything else at its default.
    pub fn enabled() -> Self {
        Self { enable_profiling: true, ..Self::default() }
    }

    /// Parse options from YAML and validate them.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let options: Self = serde_yaml_ng::from_str(yaml).map_err(|e| ProfilingError::Parse {
            context: "ProfilingOptions deserialization".to_string(),
            details: e.to_string(),
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Check that the options describe a session that can actually run.
    pub fn validate(&self) -> Result<()> {
        if self.timeline_enabled && !self.enable_profiling {
            return Err(ProfilingError::config_error(
                "timeline reporting requires profiling to be enabled",
            ));
        }
        if self.file_format != BINARY_FILE_FORMAT {
            return Err(ProfilingError::config_error(format!(
                "unsupported capture file format '{}', only '{BINARY_FILE_FORMAT}' is available",
                self.file_format
            )));
        }
        Ok(())
    }
}
