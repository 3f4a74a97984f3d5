//! Wire-level error types.

use thiserror::Error;

/// Envelope encoding and decoding errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Message carried an unexpected discriminator tag.
    #[error("unrecognized message tag: {0}")]
    UnrecognizedTag(String),
}
