//! The per-battle lifecycle state machine.
//!
//! ```text
//! Ready ──(all seats ready | timeout with someone online)──▶ Gaming
//!   │                                                          │
//!   └──(timeout, nobody online)──▶ Over ◀──(results in | frame cap)
//!                                    │
//!                                  Stop   (tick returns false)
//! ```
//!
//! Owned exclusively by one room loop; every method is synchronous and every
//! send is non-blocking. Errors never escape: bad messages are logged and
//! dropped.

use std::collections::HashMap;
use std::sync::Arc;

use lockstep_net::Session;
use lockstep_wire::proto::{
    FrameData, FrameSet, InputCmd, InputReq, JoinRoomAck, ProgressNotice,
    ProgressReq, ResultReq, StartNotice,
};
use lockstep_wire::{Codec, JsonCodec, Message, MessageKind};
use tracing::{debug, info, warn};

use crate::{
    FrameLog, Player, BROADCAST_OFFSET_FRAMES, MAX_FRAMES,
    MAX_FRAMES_PER_MESSAGE, READY_TIMEOUT_SECS,
};

/// Lifecycle states. `Stop` is terminal; `tick` returns `false` only there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Preparation: waiting for seats to fill and load.
    Ready,
    /// Play: the frame counter advances and batches broadcast.
    Gaming,
    /// One-shot hand-off to the listener before `Stop`.
    Over,
    /// Terminal.
    Stop,
}

/// Lifecycle notifications, implemented by the owning room.
pub trait GameListener: Send + Sync + 'static {
    fn on_join(&self, game_id: u64, player_id: u64);
    fn on_start(&self, game_id: u64);
    fn on_leave(&self, game_id: u64, player_id: u64);
    fn on_over(&self, game_id: u64);
}

/// One battle: roster, frame log, results, and the state machine over them.
pub struct Game {
    id: u64,
    state: GameState,
    start_unix: i64,
    random_seed: i32,
    players: HashMap<u64, Player>,
    frames: FrameLog,
    result: HashMap<u64, u64>,
    listener: Arc<dyn GameListener>,
    codec: JsonCodec,
    /// Fresh input this tick: forces the next broadcast instead of waiting
    /// for the coalescing offset.
    dirty: bool,
}

impl Game {
    /// A game in `Ready` with one vacant seat per roster member, numbered
    /// 1-based in roster order. Seat assignment never changes afterwards.
    pub fn new(
        id: u64,
        roster: &[u64],
        random_seed: i32,
        start_unix: i64,
        listener: Arc<dyn GameListener>,
    ) -> Self {
        let players = roster
            .iter()
            .enumerate()
            .map(|(idx, &pid)| (pid, Player::new(pid, idx as i32 + 1)))
            .collect();
        Self {
            id,
            state: GameState::Ready,
            start_unix,
            random_seed,
            players,
            frames: FrameLog::new(),
            result: HashMap::new(),
            listener,
            codec: JsonCodec,
            dirty: false,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn current_frame(&self) -> u32 {
        self.frames.current_frame()
    }

    /// Read access to the canonical log (room-loop-local readers only).
    pub fn frame_log(&self) -> &FrameLog {
        &self.frames
    }

    pub fn player(&self, player_id: u64) -> Option<&Player> {
        self.players.get(&player_id)
    }

    /// Attaches an authenticated session to its seat. A session already in
    /// the seat is evicted: its identity tag is cleared first so the stale
    /// close event cannot knock the replacement offline.
    ///
    /// Refuses unknown players and finished games.
    pub fn join(
        &mut self,
        player_id: u64,
        session: Arc<Session>,
        now_unix: i64,
    ) -> bool {
        if self.state == GameState::Stop {
            return false;
        }
        let Some(player) = self.players.get_mut(&player_id) else {
            return false;
        };
        if let Some(old) = player.take_session() {
            old.set_tag(None);
            old.close();
            debug!(game = self.id, player_id, "evicted previous session");
        }
        player.connect(session, now_unix);
        self.listener.on_join(self.id, player_id);
        true
    }

    /// Vacates a player's seat (session closed from the transport side).
    pub fn leave(&mut self, player_id: u64) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.cleanup();
        self.listener.on_leave(self.id, player_id);
    }

    /// One scheduler tick. Returns `false` only in `Stop`, which tells the
    /// room loop to exit.
    pub fn tick(&mut self, now_unix: i64) -> bool {
        match self.state {
            GameState::Ready => {
                self.wait_ready(now_unix);
                true
            }
            GameState::Gaming => {
                if self.check_over() {
                    info!(game = self.id, "every online player reported, game over");
                    self.state = GameState::Over;
                    return true;
                }
                if self.frames.current_frame() >= MAX_FRAMES {
                    warn!(game = self.id, frames = MAX_FRAMES, "frame cap reached");
                    self.state = GameState::Over;
                    return true;
                }
                self.frames.tick();
                self.broadcast_frames(now_unix);
                true
            }
            GameState::Over => {
                self.do_game_over();
                true
            }
            GameState::Stop => false,
        }
    }

    /// Dispatches one inbound message from an admitted player.
    ///
    /// Nothing here terminates the session or the loop: invalid payloads,
    /// wrong-state messages, and unknown kinds are logged and dropped.
    pub fn process_msg(&mut self, player_id: u64, msg: &Message, now_unix: i64) {
        if !self.players.contains_key(&player_id) {
            warn!(game = self.id, player_id, kind = msg.kind, "message from unknown player");
            return;
        }
        let Some(kind) = msg.message_kind() else {
            warn!(game = self.id, player_id, kind = msg.kind, "unknown message kind");
            return;
        };
        debug!(game = self.id, player_id, %kind, "processing message");
        match kind {
            MessageKind::JoinRoom => self.handle_join_room(player_id),
            MessageKind::Progress => self.handle_progress(player_id, msg),
            MessageKind::Heartbeat => self.handle_heartbeat(player_id, now_unix),
            MessageKind::Ready => self.handle_ready(player_id),
            MessageKind::Input => self.handle_input(player_id, msg),
            MessageKind::Result => self.handle_result(player_id, msg),
            other => {
                debug!(game = self.id, player_id, kind = %other, "ignoring message");
            }
        }
    }

    /// Broadcasts the shutdown notice. Called by the room after the loop
    /// exits, before the flush grace.
    pub fn close(&mut self) {
        for player in self.players.values() {
            player.send(Message::empty(MessageKind::Close));
        }
    }

    /// Closes every session and empties the roster.
    pub fn cleanup(&mut self) {
        for player in self.players.values_mut() {
            player.cleanup();
        }
        self.players.clear();
    }

    // -- Ready state ------------------------------------------------------

    fn wait_ready(&mut self, now_unix: i64) {
        let all_ready = !self.players.is_empty()
            && self.players.values().all(Player::is_ready);
        if all_ready {
            self.start_game();
            return;
        }
        if now_unix - self.start_unix >= READY_TIMEOUT_SECS {
            if self.players.values().any(Player::is_online) {
                warn!(game = self.id, "ready timeout, forcing start");
                self.start_game();
            } else {
                warn!(game = self.id, "ready timeout with nobody online");
                self.state = GameState::Over;
            }
        }
    }

    fn start_game(&mut self) {
        self.state = GameState::Gaming;
        self.frames.reset();
        for player in self.players.values_mut() {
            player.set_delivered_cursor(0);
        }
        match self.codec.encode(&StartNotice {
            time_stamp: self.start_unix,
        }) {
            Ok(payload) => {
                let msg = Message::new(MessageKind::Start, payload);
                for player in self.players.values() {
                    player.send(msg.clone());
                }
            }
            Err(e) => warn!(game = self.id, error = %e, "encode start notice failed"),
        }
        self.listener.on_start(self.id);
        info!(game = self.id, seed = self.random_seed, "game started");
    }

    // -- Gaming state -----------------------------------------------------

    fn check_over(&self) -> bool {
        self.players
            .values()
            .filter(|p| p.is_online())
            .all(|p| self.result.contains_key(&p.id()))
    }

    /// Per-tick frame delivery with coalescing: when there is no fresh input
    /// and nobody is more than the broadcast offset behind, skip the tick so
    /// several frames share one message.
    fn broadcast_frames(&mut self, now_unix: i64) {
        let current = self.frames.current_frame();
        if !self.dirty {
            let min_cursor = self
                .players
                .values()
                .filter(|p| p.is_online() && p.is_ready())
                .map(Player::delivered_cursor)
                .min();
            let urgent = matches!(
                min_cursor,
                Some(c) if current.saturating_sub(c) >= BROADCAST_OFFSET_FRAMES
            );
            if !urgent {
                return;
            }
        }

        for player in self.players.values_mut() {
            if !player.is_online() || !player.is_ready() {
                continue;
            }
            if player.is_bad_network(now_unix) {
                continue;
            }
            let from = player.delivered_cursor();
            if from >= current {
                continue;
            }
            send_frame_span(&self.frames, &self.codec, player, from, current);
            player.set_delivered_cursor(current);
        }
        self.dirty = false;
    }

    // -- Message handlers -------------------------------------------------

    fn handle_join_room(&mut self, player_id: u64) {
        let (others, progress): (Vec<u64>, Vec<i32>) = self
            .players
            .values()
            .filter(|p| p.id() != player_id)
            .map(|p| (p.id(), p.loading_progress()))
            .unzip();
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        let ack = JoinRoomAck {
            seat_id: player.seat(),
            random_seed: self.random_seed,
            others,
            progress,
        };
        match self.codec.encode(&ack) {
            Ok(payload) => player.send(Message::new(MessageKind::JoinRoom, payload)),
            Err(e) => warn!(game = self.id, error = %e, "encode join ack failed"),
        }
    }

    fn handle_progress(&mut self, player_id: u64, msg: &Message) {
        if self.state != GameState::Ready {
            debug!(game = self.id, player_id, "progress outside preparation");
            return;
        }
        let req: ProgressReq = match self.codec.decode(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                warn!(game = self.id, player_id, error = %e, "bad progress payload");
                return;
            }
        };
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.set_loading_progress(req.progress);

        let notice = ProgressNotice {
            player_id,
            progress: req.progress,
        };
        match self.codec.encode(&notice) {
            Ok(payload) => {
                let msg = Message::new(MessageKind::Progress, payload);
                for other in self.players.values().filter(|p| p.id() != player_id) {
                    other.send(msg.clone());
                }
            }
            Err(e) => warn!(game = self.id, error = %e, "encode progress failed"),
        }
    }

    fn handle_heartbeat(&mut self, player_id: u64, now_unix: i64) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.refresh_heartbeat(now_unix);
            player.send(Message::empty(MessageKind::Heartbeat));
        }
    }

    fn handle_ready(&mut self, player_id: u64) {
        match self.state {
            GameState::Ready => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.set_ready();
                    player.send(Message::empty(MessageKind::Ready));
                }
            }
            GameState::Gaming => {
                let current = self.frames.current_frame();
                let Some(player) = self.players.get_mut(&player_id) else {
                    return;
                };
                player.set_ready();
                player.send(Message::empty(MessageKind::Ready));

                // Reconnect replay: start notice, then the full history to
                // this player alone.
                match self.codec.encode(&StartNotice {
                    time_stamp: self.start_unix,
                }) {
                    Ok(payload) => player.send(Message::new(MessageKind::Start, payload)),
                    Err(e) => warn!(game = self.id, error = %e, "encode start notice failed"),
                }
                send_frame_span(&self.frames, &self.codec, player, 0, current);
                player.set_delivered_cursor(current);
                info!(game = self.id, player_id, frames = current, "replayed history");
            }
            state => {
                warn!(game = self.id, player_id, ?state, "ready in wrong state");
            }
        }
    }

    fn handle_input(&mut self, player_id: u64, msg: &Message) {
        if self.state != GameState::Gaming {
            warn!(game = self.id, player_id, "input outside play");
            return;
        }
        let req: InputReq = match self.codec.decode(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                warn!(game = self.id, player_id, error = %e, "bad input payload");
                return;
            }
        };
        let Some(player) = self.players.get(&player_id) else {
            return;
        };
        // Identity is stamped here, never taken from the client.
        let cmd = InputCmd {
            player_id,
            seat_id: player.seat(),
            seq_id: req.seq_id,
            x: req.x,
            y: req.y,
        };
        if self.frames.push_cmd(cmd) {
            self.dirty = true;
        } else {
            warn!(
                game = self.id,
                player_id,
                frame = self.frames.current_frame(),
                "duplicate input in frame"
            );
        }
    }

    fn handle_result(&mut self, player_id: u64, msg: &Message) {
        let req: ResultReq = match self.codec.decode(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                warn!(game = self.id, player_id, error = %e, "bad result payload");
                return;
            }
        };
        self.result.insert(player_id, req.winner_id);
        info!(game = self.id, player_id, winner = req.winner_id, "result recorded");
        if let Some(player) = self.players.get(&player_id) {
            player.send(Message::new(MessageKind::Result, msg.payload.clone()));
        }
    }

    // -- Over state -------------------------------------------------------

    fn do_game_over(&mut self) {
        self.listener.on_over(self.id);
        self.state = GameState::Stop;
        info!(
            game = self.id,
            frames = self.frames.current_frame(),
            results = self.result.len(),
            "game over"
        );
    }
}

/// Sends the frames in `[from, to)` to one player, batched. Absent frames
/// are elided, except the final boundary, which is always emitted so the
/// client learns the current frame cursor.
fn send_frame_span(
    frames: &FrameLog,
    codec: &JsonCodec,
    player: &Player,
    from: u32,
    to: u32,
) {
    let mut batch: Vec<FrameData> = Vec::new();
    for idx in from..to {
        let stored = frames.frame(idx);
        let last = idx == to - 1;
        if stored.is_none() && !last {
            continue;
        }
        batch.push(stored.cloned().unwrap_or(FrameData {
            frame_id: idx,
            cmds: Vec::new(),
        }));
        if batch.len() >= MAX_FRAMES_PER_MESSAGE || last {
            let set = FrameSet {
                frames: std::mem::take(&mut batch),
            };
            match codec.encode(&set) {
                Ok(payload) => player.send(Message::new(MessageKind::Frame, payload)),
                Err(e) => {
                    warn!(player_id = player.id(), error = %e, "encode frame batch failed");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records listener events for assertions.
    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl GameListener for Recorder {
        fn on_join(&self, _game_id: u64, player_id: u64) {
            self.events.lock().unwrap().push(format!("join:{player_id}"));
        }
        fn on_start(&self, _game_id: u64) {
            self.events.lock().unwrap().push("start".into());
        }
        fn on_leave(&self, _game_id: u64, player_id: u64) {
            self.events.lock().unwrap().push(format!("leave:{player_id}"));
        }
        fn on_over(&self, _game_id: u64) {
            self.events.lock().unwrap().push("over".into());
        }
    }

    const NOW: i64 = 1_000;

    fn game_with(roster: &[u64]) -> (Game, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let game = Game::new(7, roster, 42, NOW, recorder.clone());
        (game, recorder)
    }

    fn input_msg(seq_id: i32, x: i32, y: i32) -> Message {
        let payload = JsonCodec.encode(&InputReq { seq_id, x, y }).unwrap();
        Message::new(MessageKind::Input, payload)
    }

    fn result_msg(winner_id: u64) -> Message {
        let payload = JsonCodec.encode(&ResultReq { winner_id }).unwrap();
        Message::new(MessageKind::Result, payload)
    }

    #[test]
    fn test_seats_assigned_in_roster_order() {
        let (game, _) = game_with(&[101, 202, 303]);
        assert_eq!(game.player(101).unwrap().seat(), 1);
        assert_eq!(game.player(202).unwrap().seat(), 2);
        assert_eq!(game.player(303).unwrap().seat(), 3);
    }

    #[test]
    fn test_ready_timeout_without_players_runs_down() {
        let (mut game, recorder) = game_with(&[101, 202]);

        assert!(game.tick(NOW));
        assert_eq!(game.state(), GameState::Ready);
        assert!(game.tick(NOW + READY_TIMEOUT_SECS - 1));
        assert_eq!(game.state(), GameState::Ready);

        // Timeout with nobody online: straight to Over, then Stop.
        assert!(game.tick(NOW + READY_TIMEOUT_SECS));
        assert_eq!(game.state(), GameState::Over);
        assert!(game.tick(NOW + READY_TIMEOUT_SECS));
        assert_eq!(game.state(), GameState::Stop);
        assert!(!game.tick(NOW + READY_TIMEOUT_SECS));

        assert_eq!(recorder.events(), vec!["over"]);
    }

    #[test]
    fn test_ready_timeout_with_one_online_forces_start() {
        let (mut game, recorder) = game_with(&[101, 202]);
        game.players.get_mut(&101).unwrap().force_online(NOW);

        // 202 never shows up: not all ready, so nothing before the timeout.
        assert!(game.tick(NOW + READY_TIMEOUT_SECS - 1));
        assert_eq!(game.state(), GameState::Ready);

        assert!(game.tick(NOW + READY_TIMEOUT_SECS));
        assert_eq!(game.state(), GameState::Gaming);
        assert_eq!(recorder.events(), vec!["start"]);
    }

    #[test]
    fn test_all_ready_starts_within_one_tick() {
        let (mut game, _) = game_with(&[101, 202]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.players.get_mut(&202).unwrap().force_online(NOW);

        assert!(game.tick(NOW + 1));
        assert_eq!(game.state(), GameState::Gaming);
        assert_eq!(game.current_frame(), 0);
    }

    #[test]
    fn test_frame_advances_exactly_once_per_tick() {
        let (mut game, _) = game_with(&[101]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.tick(NOW); // Ready → Gaming

        for expected in 1..=5 {
            assert!(game.tick(NOW));
            assert_eq!(game.current_frame(), expected);
        }
    }

    #[test]
    fn test_delivered_cursor_is_non_decreasing() {
        let (mut game, _) = game_with(&[101]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.tick(NOW);

        let mut last = 0;
        for _ in 0..10 {
            game.process_msg(101, &input_msg(1, 1, 1), NOW);
            game.tick(NOW);
            let cursor = game.player(101).unwrap().delivered_cursor();
            assert!(cursor >= last);
            last = cursor;
        }
        assert_eq!(last, game.current_frame());
    }

    #[test]
    fn test_duplicate_input_in_frame_is_dropped() {
        let (mut game, _) = game_with(&[101, 202]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.players.get_mut(&202).unwrap().force_online(NOW);
        game.tick(NOW); // → Gaming, frame 0 in progress

        game.process_msg(101, &input_msg(1, 10, 0), NOW);
        game.process_msg(101, &input_msg(2, 99, 99), NOW);
        game.process_msg(202, &input_msg(1, -10, 0), NOW);

        let frame = game.frame_log().frame(0).unwrap();
        assert_eq!(frame.cmds.len(), 2);
        assert_eq!(frame.cmds[0].player_id, 101);
        assert_eq!(frame.cmds[0].seq_id, 1);
        assert_eq!(frame.cmds[1].player_id, 202);
    }

    #[test]
    fn test_input_identity_is_stamped_server_side() {
        let (mut game, _) = game_with(&[101, 202]);
        game.players.get_mut(&202).unwrap().force_online(NOW);
        game.tick(NOW + READY_TIMEOUT_SECS); // forced start

        game.process_msg(202, &input_msg(5, 3, 4), NOW);
        let cmd = game.frame_log().frame(0).unwrap().cmds[0];
        assert_eq!(cmd.player_id, 202);
        assert_eq!(cmd.seat_id, 2);
        assert_eq!(cmd.seq_id, 5);
    }

    #[test]
    fn test_input_outside_gaming_is_ignored() {
        let (mut game, _) = game_with(&[101]);
        game.process_msg(101, &input_msg(1, 1, 1), NOW);
        assert!(game.frame_log().frame(0).is_none());
    }

    #[test]
    fn test_progress_only_in_ready() {
        let (mut game, _) = game_with(&[101]);
        let payload = JsonCodec.encode(&ProgressReq { progress: 55 }).unwrap();
        let msg = Message::new(MessageKind::Progress, payload);

        game.process_msg(101, &msg, NOW);
        assert_eq!(game.player(101).unwrap().loading_progress(), 55);

        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.tick(NOW); // → Gaming
        let payload = JsonCodec.encode(&ProgressReq { progress: 99 }).unwrap();
        game.process_msg(101, &Message::new(MessageKind::Progress, payload), NOW);
        assert_eq!(game.player(101).unwrap().loading_progress(), 55);
    }

    #[test]
    fn test_message_from_unknown_player_is_dropped() {
        let (mut game, _) = game_with(&[101]);
        // Must not panic or mutate anything.
        game.process_msg(999, &input_msg(1, 1, 1), NOW);
        assert!(game.frame_log().frame(0).is_none());
    }

    #[test]
    fn test_results_from_all_online_players_end_game() {
        let (mut game, recorder) = game_with(&[101, 202]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.players.get_mut(&202).unwrap().force_online(NOW);
        game.tick(NOW); // → Gaming

        game.process_msg(101, &result_msg(101), NOW);
        assert!(game.tick(NOW));
        assert_eq!(game.state(), GameState::Gaming);

        game.process_msg(202, &result_msg(101), NOW);
        assert!(game.tick(NOW));
        assert_eq!(game.state(), GameState::Over);
        assert!(game.tick(NOW));
        assert_eq!(game.state(), GameState::Stop);
        assert!(!game.tick(NOW));
        assert_eq!(recorder.events(), vec!["start", "over"]);
    }

    #[test]
    fn test_offline_player_does_not_block_game_over() {
        let (mut game, _) = game_with(&[101, 202]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.tick(NOW + READY_TIMEOUT_SECS); // forced start

        game.process_msg(101, &result_msg(101), NOW);
        game.tick(NOW);
        assert_eq!(game.state(), GameState::Over);
    }

    #[test]
    fn test_frame_cap_is_a_hard_upper_bound() {
        let (mut game, _) = game_with(&[101]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.tick(NOW); // → Gaming

        for _ in 0..MAX_FRAMES + 50 {
            if !game.tick(NOW) {
                break;
            }
        }
        assert!(game.current_frame() <= MAX_FRAMES);
        assert_eq!(game.state(), GameState::Stop);
    }

    #[test]
    fn test_bad_network_suppresses_cursor_advance() {
        let (mut game, _) = game_with(&[101]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.tick(NOW); // → Gaming

        // Heartbeat goes stale: broadcasts skip the player.
        game.process_msg(101, &input_msg(1, 1, 1), NOW);
        game.tick(NOW + 3);
        assert_eq!(game.player(101).unwrap().delivered_cursor(), 0);

        // Heartbeat resumes: the backlog flushes from the stored cursor.
        game.process_msg(101, &Message::empty(MessageKind::Heartbeat), NOW + 3);
        game.process_msg(101, &input_msg(2, 1, 1), NOW + 3);
        game.tick(NOW + 3);
        assert_eq!(
            game.player(101).unwrap().delivered_cursor(),
            game.current_frame()
        );
    }

    #[test]
    fn test_broadcast_coalesces_until_offset() {
        let (mut game, _) = game_with(&[101]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.tick(NOW); // → Gaming

        // No input: the first two ticks stay under the offset.
        game.tick(NOW);
        game.tick(NOW);
        assert_eq!(game.player(101).unwrap().delivered_cursor(), 0);

        // Third frame of lag reaches the offset and forces delivery.
        game.tick(NOW);
        assert_eq!(game.player(101).unwrap().delivered_cursor(), 3);
    }

    #[test]
    fn test_reconnect_ready_resets_cursor_to_current() {
        let (mut game, _) = game_with(&[101]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.tick(NOW); // → Gaming
        for _ in 0..10 {
            game.tick(NOW);
        }

        game.players.get_mut(&101).unwrap().set_delivered_cursor(2);
        game.process_msg(101, &Message::empty(MessageKind::Ready), NOW);
        assert_eq!(
            game.player(101).unwrap().delivered_cursor(),
            game.current_frame()
        );
    }

    #[test]
    fn test_leave_notifies_listener_and_vacates() {
        let (mut game, recorder) = game_with(&[101]);
        game.players.get_mut(&101).unwrap().force_online(NOW);
        game.leave(101);
        assert!(!game.player(101).unwrap().is_online());
        assert_eq!(recorder.events(), vec!["leave:101"]);
    }
}
