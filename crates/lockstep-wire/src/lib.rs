//! Wire protocol for the lockstep relay.
//!
//! This crate defines the "language" that clients and the relay speak:
//!
//! - **Framing** ([`Message`], [`MessageKind`], [`encode`], [`decode`]): the
//!   length-prefixed byte layout every message travels in.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how payloads are converted
//!   to/from bytes.
//! - **Payload schemas** ([`proto`]): the structures carried inside frames.
//! - **Errors** ([`WireError`]): what can go wrong on the framing path.
//!
//! # Architecture
//!
//! The wire layer sits between transport (raw bytes) and session (player
//! context). It knows nothing about connections, rooms, or frames-as-in-
//! lockstep, only how bytes are laid out.
//!
//! ```text
//! Transport (bytes) → Wire (Message) → Session (player context)
//! ```

mod codec;
mod error;
mod frame;
pub mod proto;

pub use codec::{Codec, JsonCodec};
pub use error::WireError;
pub use frame::{
    decode, decode_header, encode, Message, MessageKind, HEADER_LEN,
    MAX_PAYLOAD_LEN,
};
