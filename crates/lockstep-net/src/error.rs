//! Error types for the session layer.

use lockstep_wire::WireError;

/// Errors that can occur on a session's send path or during I/O.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The session is closed (or closed while the send was waiting).
    #[error("use of closed session")]
    Closed,

    /// The outbound mailbox is full and the caller asked not to wait.
    #[error("send would block: outbound queue full")]
    WouldBlock,

    /// Framing failed on the read path; fatal for the session.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Transport-level I/O failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}
