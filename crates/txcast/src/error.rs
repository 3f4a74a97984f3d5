//! Propagation error types.

use thiserror::Error;

/// Propagation errors.
///
/// These surface only inside the library: every send-path error is caught at
/// the send site and logged, never returned to the committing caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Envelope encoding or decoding failed.
    #[error("wire error: {0}")]
    Proto(#[from] txcast_proto::Error),

    /// Datagram channel error.
    #[error("channel error: {0}")]
    Channel(String),

    /// Shared store error.
    #[error("store error: {0}")]
    Store(String),

    /// Hub socket error.
    #[error("hub error: {0}")]
    Hub(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
