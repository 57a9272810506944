//! Session abstraction for the chat core.
//!
//! A session is the transport-owned handle to one live connection. The chat
//! core only borrows it to push bytes and, on EXIT, to close it.

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Create a new connection ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a process-unique connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let n = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}", n))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to close the connection.
    #[error("Close failed: {0}")]
    CloseFailed(String),
}

/// A live connection the chat core can push to.
///
/// Both operations are fire-and-forget: they enqueue work for the transport
/// and return without waiting for the peer.
pub trait Session: Send + Sync + fmt::Debug {
    /// Get the connection's unique identifier.
    fn id(&self) -> &ConnectionId;

    /// Queue an encoded envelope for delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed or the transport refused the data.
    fn send(&self, data: Bytes) -> Result<(), TransportError>;

    /// Close the connection.
    ///
    /// Closing an already closed session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport could not initiate the close.
    fn close(&self) -> Result<(), TransportError>;

    /// Check if the session is still open.
    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_generation() {
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn_"));
    }

    #[test]
    fn test_connection_id_from_string() {
        let id: ConnectionId = "test-id".into();
        assert_eq!(id.as_str(), "test-id");
        assert_eq!(id.to_string(), "test-id");
    }
}
