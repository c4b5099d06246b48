//! Error types for the IRC line codec.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Reasons a raw IRC line could not be turned into a [`crate::Line`].
///
/// Both variants are recoverable: the caller logs the line and drops it,
/// the connection carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer than two usable characters left after trimming.
    #[error("line too short")]
    TooShort,

    /// The line does not have the shape of an IRC message.
    #[error("malformed line: {0}")]
    Malformed(&'static str),
}

/// Transport-level errors raised by [`crate::LineCodec`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
