//! Branded ID newtypes for type safety.
//!
//! Connection ids are process-unique integers handed out by the transport
//! layer. Wrapping them in a newtype prevents accidentally passing some
//! other counter where a connection id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for one transport connection.
///
/// Assigned by the transport layer when the connection is accepted and
/// never reused while the process lives. The core only attaches ephemeral
/// state (decoder buffers, session tokens) to this id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a raw transport-assigned id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw integer value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ConnectionId> for u64 {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
