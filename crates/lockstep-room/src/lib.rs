//! Room layer: one cooperative loop per battle, and the registry that owns
//! every room.
//!
//! A [`Room`] is the single owner of its game. Session callbacks never touch
//! game state: they shove events into the room's bounded queues, and the
//! room loop drains them between scheduler ticks. No lock guards the game,
//! the frame log, or player state: there is exactly one writer.

mod error;
mod registry;
mod room;

pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{Room, ROOM_TIMEOUT, TICK_HZ};
