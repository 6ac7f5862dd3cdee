//! # Lockstep
//!
//! Authoritative relay server for lock-step multiplayer battles.
//!
//! Clients submit input commands tagged with a logical frame; the relay
//! deterministically orders them into numbered frames and broadcasts the
//! canonical frame stream back to every participant. Clients run identical
//! simulations off that identical stream; the server never computes game
//! physics, it guarantees ordering, participation, and delivery.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use lockstep::prelude::*;
//!
//! # async fn run() -> Result<(), ServerError> {
//! let server = LockstepServer::bind("0.0.0.0:10086").await?;
//! server
//!     .registry()
//!     .create(1000, 1, vec![101, 202], 42, "127.0.0.1:9000")?;
//! // ... rooms are normally created by the admin surface ...
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod router;
mod server;

pub use error::ServerError;
pub use router::{AcceptAll, Router, TokenVerifier};
pub use server::LockstepServer;

/// Re-exports everything an integrator needs.
pub mod prelude {
    pub use crate::{AcceptAll, LockstepServer, Router, ServerError, TokenVerifier};

    pub use lockstep_game::{Game, GameListener, GameState};
    pub use lockstep_net::{
        NetError, NetServer, Session, SessionCallback, SessionConfig,
    };
    pub use lockstep_room::{Room, RoomError, RoomRegistry};
    pub use lockstep_wire::{
        Codec, JsonCodec, Message, MessageKind, WireError,
    };
}
