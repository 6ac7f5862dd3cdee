//! Append-only, sparsely materialised frame store.
//!
//! A frame with no commands is not stored; broadcast logic treats absent
//! frames as empty. A frame that has been emitted to any client is never
//! mutated: commands only ever land in the in-progress frame.

use std::collections::HashMap;

use lockstep_wire::proto::{FrameData, InputCmd};

/// The per-battle frame log: `frame_id → FrameData` plus the monotonically
/// non-decreasing frame counter.
#[derive(Debug, Default)]
pub struct FrameLog {
    frames: HashMap<u32, FrameData>,
    current_frame: u32,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all frames and zeroes the counter. Only legal at game
    /// (re)start, before anything has been emitted.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.current_frame = 0;
    }

    /// The in-progress frame id. Stored frames are strictly below this,
    /// except the in-progress one.
    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Advances the counter by exactly one and returns the new value.
    /// Called once per scheduler tick while the game is in play.
    pub fn tick(&mut self) -> u32 {
        self.current_frame += 1;
        self.current_frame
    }

    /// Places `cmd` into the in-progress frame, materialising it if absent.
    ///
    /// Returns `false` when a command with the same `player_id` is already
    /// in that frame; at most one input per player per frame is the
    /// invariant client simulations depend on.
    pub fn push_cmd(&mut self, cmd: InputCmd) -> bool {
        let frame = self
            .frames
            .entry(self.current_frame)
            .or_insert_with(|| FrameData {
                frame_id: self.current_frame,
                cmds: Vec::new(),
            });
        if frame.cmds.iter().any(|c| c.player_id == cmd.player_id) {
            return false;
        }
        frame.cmds.push(cmd);
        true
    }

    /// The frame at `idx`, if it was materialised.
    pub fn frame(&self, idx: u32) -> Option<&FrameData> {
        self.frames.get(&idx)
    }

    /// Stored frames in `from..=to`, clamped to the current frame; absent
    /// frames are skipped silently.
    pub fn range(&self, from: u32, to: u32) -> Vec<&FrameData> {
        let mut out = Vec::new();
        let mut idx = from;
        while idx <= to && idx <= self.current_frame {
            if let Some(f) = self.frames.get(&idx) {
                out.push(f);
            }
            idx += 1;
        }
        out
    }
}
