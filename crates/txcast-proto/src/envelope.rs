//! Envelope types wrapping a commit notification for each transport.
//!
//! Three wire shapes exist, one per physical channel. All of them carry the
//! opaque `changedParts` payload unchanged; the wrapper fields are routing
//! metadata only. Encoding is JSON text on every channel: the store file is
//! JSON by contract, and the other channels reuse the same codec.

use serde::{Deserialize, Serialize};

use crate::{Error, MESSAGE_TYPE};

/// Opaque description of what data changed in a committed transaction.
///
/// Produced and consumed by the live-query side; this crate only guarantees
/// that the value survives an encode/decode round trip intact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangedParts(pub serde_json::Value);

impl ChangedParts {
    /// Wrap an arbitrary JSON value as a changed-parts payload.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the inner JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for ChangedParts {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ChangedParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Envelope written to the shared store file.
///
/// `trig` is a fresh random nonce per write so that two structurally equal
/// payloads still produce distinct file contents, and therefore an observable
/// change event, on every publish. Receivers also use it to recognize their
/// own writes and to collapse duplicate filesystem events for one write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEnvelope {
    /// Random nonzero trigger nonce for this write.
    pub trig: u64,
    /// The propagated payload.
    #[serde(rename = "changedParts")]
    pub changed_parts: ChangedParts,
}

impl StoreEnvelope {
    /// Create an envelope with the given trigger nonce.
    pub fn new(trig: u64, changed_parts: ChangedParts) -> Self {
        Self {
            trig,
            changed_parts,
        }
    }

    /// Encode to the JSON text stored under the well-known key.
    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode from stored JSON text.
    pub fn decode(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Envelope exchanged over the hub socket.
///
/// The `type` tag distinguishes commit notifications from any other traffic a
/// peer might put on the socket; receivers drop messages whose tag does not
/// match [`MESSAGE_TYPE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEnvelope {
    /// Discriminator tag, always [`MESSAGE_TYPE`] for messages we emit.
    #[serde(rename = "type")]
    pub tag: String,
    /// The propagated payload.
    #[serde(rename = "changedParts")]
    pub changed_parts: ChangedParts,
}

impl HubEnvelope {
    /// Create a tagged envelope for the given payload.
    pub fn new(changed_parts: ChangedParts) -> Self {
        Self {
            tag: MESSAGE_TYPE.to_string(),
            changed_parts,
        }
    }

    /// Encode to JSON bytes for a socket message.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a socket message, rejecting foreign tags.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let envelope: Self =
            serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))?;
        if envelope.tag != MESSAGE_TYPE {
            return Err(Error::UnrecognizedTag(envelope.tag));
        }
        Ok(envelope)
    }
}

/// Frame sent on the datagram channel.
///
/// Multicast loops a datagram back to every socket on the host, including the
/// sender's own, so the frame carries a per-process random `src` token and
/// receivers drop frames carrying their own token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFrame {
    /// Discriminator tag, always [`MESSAGE_TYPE`] for frames we emit.
    #[serde(rename = "type")]
    pub tag: String,
    /// Sender token, random per process.
    pub src: u64,
    /// The propagated payload.
    #[serde(rename = "changedParts")]
    pub changed_parts: ChangedParts,
}

impl ChannelFrame {
    /// Create a frame from the given sender token and payload.
    pub fn new(src: u64, changed_parts: ChangedParts) -> Self {
        Self {
            tag: MESSAGE_TYPE.to_string(),
            src,
            changed_parts,
        }
    }

    /// Encode to JSON bytes for a single datagram.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a received datagram, rejecting foreign tags.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let frame: Self =
            serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))?;
        if frame.tag != MESSAGE_TYPE {
            return Err(Error::UnrecognizedTag(frame.tag));
        }
        Ok(frame)
    }
}
