//! Protocol version encoding
//!
//! Versions travel on the wire as a single `u32`:
//!
//! ```text
//!  31            22 21          12 11             0
//! +----------------+--------------+----------------+
//! |     major      |    minor     |     patch      |
//! +----------------+--------------+----------------+
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

const PATCH_BITS: u32 = 12;
const MINOR_BITS: u32 = 10;
const MINOR_SHIFT: u32 = PATCH_BITS;
const MAJOR_SHIFT: u32 = PATCH_BITS + MINOR_BITS;
const PATCH_MASK: u32 = (1 << PATCH_BITS) - 1;
const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;

/// Pack a version triple into its wire representation.
///
/// Fields wider than their slot are truncated to the slot width.
pub const fn encode_version(major: u32, minor: u32, patch: u32) -> u32 {
    (major << MAJOR_SHIFT) | ((minor & MINOR_MASK) << MINOR_SHIFT) | (patch & PATCH_MASK)
}

/// Unpack a wire version into `(major, minor, patch)`.
pub const fn decode_version(encoded: u32) -> (u32, u32, u32) {
    (encoded >> MAJOR_SHIFT, (encoded >> MINOR_SHIFT) & MINOR_MASK, encoded & PATCH_MASK)
}

/// A protocol version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
}

impl Version {
    /// Create a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Decode a version from its wire representation. Every `u32` is a valid version.
    pub const fn from_encoded(encoded: u32) -> Self {
        let (major, minor, patch) = decode_version(encoded);
        Self { major, minor, patch }
    }

    /// Wire representation of this version.
    pub const fn encoded(&self) -> u32 {
        encode_version(self.major, self.minor, self.patch)
    }

    pub const fn major(&self) -> u32 {
        self.major
    }

    pub const fn minor(&self) -> u32 {
        self.minor
    }

    pub const fn patch(&self) -> u32 {
        self.patch
    }
}

impl From<u32> for Version {
    fn from(encoded: u32) -> Self {
        Self::from_encoded(encoded)
    }
}

impl From<Version> for u32 {
    fn from(version: Version) -> Self {
        version.encoded()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
