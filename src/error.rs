//! Error types for the daemon.
//!
//! Only [`LinkError`] is fatal. Everything else is handled where it happens:
//! a failed dial is retried, and a routing miss is logged and dropped.

use std::io;
use thiserror::Error;

// ============================================================================
// Upstream errors
// ============================================================================

/// A single failed attempt to open an upstream socket.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection failed: {0}")]
    Io(#[from] io::Error),

    #[error("invalid TLS server name: {0}")]
    ServerName(String),

    #[error("TLS handshake timed out")]
    HandshakeTimeout,
}

/// Ways an upstream link can end that take the daemon down with it.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{network}: gave up after {attempts} connection attempts: {last}")]
    Exhausted {
        network: String,
        attempts: u32,
        #[source]
        last: ConnectError,
    },

    #[error("{network}: write failed: {source}")]
    Write {
        network: String,
        #[source]
        source: io::Error,
    },
}

/// Whether a write error means the peer went away, as opposed to something
/// the daemon cannot recover from.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

// ============================================================================
// Routing errors
// ============================================================================

/// A command that cannot be delivered. Logged and dropped by the router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("client is not bound to a channel")]
    NotBound,
}
