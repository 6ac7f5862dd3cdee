//! Error types for the wire layer.

/// Errors that can occur while framing or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The buffer is too short to hold the header, or shorter than the
    /// length the header promises.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The header announces a payload larger than the domain ceiling.
    #[error("payload of {0} bytes exceeds the {max} byte limit", max = crate::MAX_PAYLOAD_LEN)]
    OversizePayload(usize),

    /// Payload serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Payload deserialization failed.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
