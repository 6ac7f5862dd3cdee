//! Session layer for the lockstep relay.
//!
//! A [`Session`] wraps one live transport connection in bounded send/receive
//! mailboxes serviced by three workers (reader, writer, handler). Higher
//! layers talk to sessions only through the [`SessionCallback`] capability
//! set and the non-blocking send surface; they never touch the socket.
//!
//! [`NetServer`] is the accept loop: it owns the listening socket, applies
//! per-connection transport options in one place, and starts the workers for
//! every accepted session.
//!
//! ```text
//! Transport ⇄ Session workers ⇄ bounded mailboxes ⇄ callback owner (router/room)
//! ```

mod error;
mod server;
mod session;

pub use error::NetError;
pub use server::{NetServer, NetStopper};
pub use session::{Session, SessionCallback, SessionConfig};
