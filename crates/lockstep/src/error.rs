//! Unified error type for the relay server.

use lockstep_net::NetError;
use lockstep_room::RoomError;
use lockstep_wire::WireError;

/// Top-level error wrapping the layer-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Session or listener failure.
    #[error(transparent)]
    Net(#[from] NetError),

    /// Room creation failure.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Framing or payload codec failure.
    #[error(transparent)]
    Wire(#[from] WireError),
}
