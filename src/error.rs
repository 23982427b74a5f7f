//! Error types for the raw-mode protocol library.

use std::io;
use thiserror::Error;

/// Result type for raw-mode protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while running the raw-mode protocol.
///
/// Conditions the protocol defines as *silent* (a bad checksum, an unknown
/// packet kind, a filesystem request against a disabled feature on the
/// server) are never represented here — they are `Ok(None)`/no-ops at the
/// call site, not errors. Only the conditions the spec marks "surface a
/// failure" or "fatal caller error" produce a `ProtocolError`.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The transport rejected or could not deliver a frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// Version/feature handshake failed to converge.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// A frame could not be built (e.g. payload too large for the
    /// negotiated framing mode).
    #[error("framing error: {0}")]
    Framing(String),

    /// A filesystem request or response could not be completed.
    #[error("filesystem error: {0}")]
    Fs(String),

    /// Caller passed arguments that violate a documented invariant
    /// (e.g. mismatched character/color slice lengths to a blit call).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The transport has been closed; no further I/O will be attempted.
    #[error("connection closed")]
    ConnectionClosed,

    /// A blocking wait (e.g. an FSBridge call) exceeded its deadline.
    #[error("operation timed out")]
    Timeout,
}
