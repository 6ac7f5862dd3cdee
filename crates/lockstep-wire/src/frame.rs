//! Length-prefixed message framing.
//!
//! Every message on the wire is laid out big-endian as:
//!
//! ```text
//! |--payload_len(u16)--|--kind(u8)--|--------payload--------|
//! |---------2----------|-----1------|------payload_len------|
//! ```
//!
//! An empty payload is legal. The payload ceiling is enforced on the decode
//! path only; encoding accepts anything that fits the `u16` length field.

use crate::WireError;

/// Bytes in the fixed header: `u16` payload length + `u8` message kind.
pub const HEADER_LEN: usize = 3;

/// Domain ceiling for a decoded payload. A header announcing more than this
/// fails decoding and the session treats it as fatal.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// Message kinds recognised by the relay.
///
/// The framing layer keeps the kind as a raw byte ([`Message::kind`]);
/// unknown values are a protocol-level concern (log and ignore), not a
/// framing error. Dispatch sites convert with [`MessageKind::try_from`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// C2S admission request / S2C admission reply.
    Connect = 1,
    /// C2S room info request / S2C seat + seed reply.
    JoinRoom = 2,
    /// C2S loading progress / S2C progress fan-out.
    Progress = 3,
    /// Liveness probe, echoed back.
    Heartbeat = 4,
    /// C2S readiness (also the reconnect trigger while gaming) / S2C echo.
    Ready = 5,
    /// C2S input command for the current frame.
    Input = 6,
    /// S2C frame batch.
    Frame = 7,
    /// S2C game start notice.
    Start = 8,
    /// C2S claimed result / S2C echo.
    Result = 9,
    /// S2C room shutdown notice.
    Close = 10,
    /// Protocol debug probe, echoed back with its payload.
    End = 11,
}

impl TryFrom<u8> for MessageKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            1 => Ok(Self::Connect),
            2 => Ok(Self::JoinRoom),
            3 => Ok(Self::Progress),
            4 => Ok(Self::Heartbeat),
            5 => Ok(Self::Ready),
            6 => Ok(Self::Input),
            7 => Ok(Self::Frame),
            8 => Ok(Self::Start),
            9 => Ok(Self::Result),
            10 => Ok(Self::Close),
            11 => Ok(Self::End),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One framed message: a kind byte and an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw kind byte as it appeared on the wire.
    pub kind: u8,
    /// Opaque payload; schema depends on the kind.
    pub payload: Vec<u8>,
}

impl Message {
    /// Builds a message for a recognised kind.
    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self {
            kind: kind as u8,
            payload,
        }
    }

    /// A message with no payload, for kinds that are pure signals
    /// (heartbeat, ready echo, close).
    pub fn empty(kind: MessageKind) -> Self {
        Self::new(kind, Vec::new())
    }

    /// The recognised kind, if the byte maps to one.
    pub fn message_kind(&self) -> Option<MessageKind> {
        MessageKind::try_from(self.kind).ok()
    }

    /// Serialises the message into a single contiguous buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.push(self.kind);
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Encodes a kind + payload into wire bytes. One contiguous allocation.
pub fn encode(kind: MessageKind, payload: &[u8]) -> Vec<u8> {
    Message {
        kind: kind as u8,
        payload: payload.to_vec(),
    }
    .encode()
}

/// Parses the fixed header, returning the payload length and raw kind byte.
///
/// Streaming readers call this after `read_exact`-ing [`HEADER_LEN`] bytes,
/// then read exactly the returned number of payload bytes.
pub fn decode_header(header: [u8; HEADER_LEN]) -> Result<(usize, u8), WireError> {
    let len = u16::from_be_bytes([header[0], header[1]]) as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(WireError::OversizePayload(len));
    }
    Ok((len, header[2]))
}

/// Decodes exactly one message from a complete buffer.
pub fn decode(buf: &[u8]) -> Result<Message, WireError> {
    if buf.len() < HEADER_LEN {
        return Err(WireError::MalformedFrame(format!(
            "{} bytes is shorter than the {HEADER_LEN} byte header",
            buf.len()
        )));
    }
    let (len, kind) = decode_header([buf[0], buf[1], buf[2]])?;
    let body = &buf[HEADER_LEN..];
    if body.len() != len {
        return Err(WireError::MalformedFrame(format!(
            "header announces {len} payload bytes, buffer holds {}",
            body.len()
        )));
    }
    Ok(Message {
        kind,
        payload: body.to_vec(),
    })
}
