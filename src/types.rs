//! Basic type definitions for the relay
//!
//! Provides `ConnectionId`, the key a connection is known by in the pool
//! and on the writer failure channel.

use uuid::Uuid;

/// Identity of one accepted connection
///
/// Minted when the listener accepts a stream and carried by its session,
/// writer task and pool entry, so a failed write can be traced back to the
/// entry to remove. Never reused, even after the connection is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Mint an id for a freshly accepted connection
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
