//! Codec trait and implementations for payload serialization.
//!
//! The framing layer treats payloads as opaque bytes; a [`Codec`] converts
//! them to and from typed payload structs. Swapping the implementation (for
//! a binary codec, say) changes nothing above this seam.

use serde::{de::DeserializeOwned, Serialize};

use crate::WireError;

/// Encodes payload types to bytes and decodes bytes back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a payload value into bytes.
    ///
    /// # Errors
    /// Returns [`WireError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, WireError>;

    /// Deserializes bytes back into a payload value.
    ///
    /// # Errors
    /// Returns [`WireError::Decode`] if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, WireError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Human-readable, which keeps payloads inspectable in logs and easy to
/// fabricate in tests. Payload schemas are negotiated out of band, so the
/// relay is free to pick the representation.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(value).map_err(WireError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, WireError> {
        serde_json::from_slice(data).map_err(WireError::Decode)
    }
}
