//! Peer identity: a random 128-bit identifier assigned at accept time.

use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

/// Identity of one connected peer.
///
/// Generated randomly when a connection is accepted, never derived from the
/// network address and never reused. The textual form is the canonical
/// hyphenated UUID grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(Uuid);

impl PeerId {
    /// Generate a fresh random identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for PeerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}
