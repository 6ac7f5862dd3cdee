//! Lockstep core: the per-battle game state machine and its parts.
//!
//! The server never simulates the game. It orders player inputs into
//! numbered frames ([`FrameLog`]), tracks per-seat participation
//! ([`Player`]), and drives a preparation → play → end lifecycle ([`Game`])
//! that broadcasts the canonical frame stream back to every participant.
//!
//! Everything in this crate is synchronous and owned by exactly one room
//! loop; nothing here locks or blocks.

mod frame_log;
mod game;
mod player;

pub use frame_log::FrameLog;
pub use game::{Game, GameListener, GameState};
pub use player::Player;

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds a room waits in preparation before forcing a start (or giving up
/// when nobody connected).
pub const READY_TIMEOUT_SECS: i64 = 20;

/// Hard cap on the frame counter: 3 minutes at 30 ticks/s, plus slack.
pub const MAX_FRAMES: u32 = 30 * 60 * 3 + 100;

/// A player whose last heartbeat is at least this old is in the
/// "bad network" window: frame broadcasts to it are suppressed so its
/// outbound queue doesn't fill and force-close the session.
pub const BAD_NETWORK_SECS: i64 = 2;

/// How many frames may accumulate before a broadcast is forced even with no
/// fresh input.
pub const BROADCAST_OFFSET_FRAMES: u32 = 3;

/// Maximum frames batched into a single `Frame` message.
pub const MAX_FRAMES_PER_MESSAGE: usize = 60;

/// Wall-clock unix seconds. The room loop is the single caller; everything
/// below it takes `now` as a parameter.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
