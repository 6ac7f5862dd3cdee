//! Payload schemas carried inside framed messages.
//!
//! One struct per message kind and direction. Client→server requests carry
//! only what the client knows; identity fields (`player_id`, `seat_id`) are
//! stamped server-side before a command enters the canonical frame stream.

use serde::{Deserialize, Serialize};

/// C2S `Connect`: admission request for a seat in a battle room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectReq {
    pub player_id: u64,
    pub battle_id: u64,
    pub token: String,
}

/// Admission outcome codes for [`ConnectAck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectCode {
    /// Admitted; the room owns the session from here on.
    Ok,
    /// No room with the requested battle id.
    NoRoom,
    /// The room exists but its game is already over.
    RoomState,
    /// The player id is not on the room's roster.
    NoPlayer,
    /// Token verification failed.
    BadToken,
}

/// S2C `Connect`: admission reply. On failure the session stays open so the
/// client may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectAck {
    pub code: ConnectCode,
}

/// S2C `JoinRoom`: the joining player's seat, the shared seed, and where the
/// other seats stand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomAck {
    pub seat_id: i32,
    pub random_seed: i32,
    /// Player ids of the other roster members, parallel to `progress`.
    pub others: Vec<u64>,
    pub progress: Vec<i32>,
}

/// C2S `Progress`: loading progress while the game is still in preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReq {
    pub progress: i32,
}

/// S2C `Progress`: one player's progress, fanned out to the other seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressNotice {
    pub player_id: u64,
    pub progress: i32,
}

/// C2S `Input`: one input command aimed at the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputReq {
    pub seq_id: i32,
    pub x: i32,
    pub y: i32,
}

/// A canonical input command as it appears in the frame stream. Identity key
/// within a frame is `player_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputCmd {
    pub player_id: u64,
    pub seat_id: i32,
    pub seq_id: i32,
    pub x: i32,
    pub y: i32,
}

/// One numbered frame of the canonical stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameData {
    pub frame_id: u32,
    pub cmds: Vec<InputCmd>,
}

/// S2C `Frame`: a batch of consecutive-ish frames (absent frames elided).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSet {
    pub frames: Vec<FrameData>,
}

/// S2C `Start`: the game left preparation; `time_stamp` is the game's start
/// time in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartNotice {
    pub time_stamp: i64,
}

/// C2S `Result`: the player's claimed winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultReq {
    pub winner_id: u64,
}
