//! The battle room: handle for the outside world, driver loop for the game.
//!
//! The handle ([`Room`]) carries the queues and flags other tasks may touch.
//! The driver owns the [`Game`] and is the only code that mutates it; it
//! multiplexes the exit signal, session handoffs, departures, the tick
//! timer, the hard lifetime timer, and inbound messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lockstep_game::{unix_now, Game, GameListener};
use lockstep_net::{Session, SessionCallback};
use lockstep_tick::TickScheduler;
use lockstep_wire::Message;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

/// Scheduler rate for every room loop.
pub const TICK_HZ: u32 = 30;

/// Absolute room lifetime. A battle still running at this point is cut off.
pub const ROOM_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Seconds between loop exit and session teardown, giving the transport
/// time to flush the close notice.
const CLOSE_GRACE_SECS: u64 = 3;

const MESSAGE_QUEUE_LIMIT: usize = 2048;
const HANDOFF_QUEUE_LIMIT: usize = 8;

/// Handle to one battle room.
///
/// Shared with the router (admission) and the sessions it owns (callbacks).
/// Everything mutable behind it is either atomic or a queue endpoint.
#[derive(Debug)]
pub struct Room {
    room_id: u64,
    type_id: i32,
    secret_key: String,
    roster: Vec<u64>,
    logic_server: String,
    created_unix: i64,
    close_flag: AtomicBool,
    exit_tx: watch::Sender<bool>,
    session_in: mpsc::Sender<Arc<Session>>,
    session_out: mpsc::Sender<Arc<Session>>,
    message_in: mpsc::Sender<(u64, Message)>,
}

impl Room {
    /// Builds the handle/driver pair. The registry spawns the driver.
    pub(crate) fn new(
        room_id: u64,
        type_id: i32,
        roster: Vec<u64>,
        random_seed: i32,
        logic_server: String,
    ) -> (Arc<Room>, RoomDriver) {
        let (exit_tx, exit_rx) = watch::channel(false);
        let (session_in, session_in_rx) = mpsc::channel(HANDOFF_QUEUE_LIMIT);
        let (session_out, session_out_rx) = mpsc::channel(HANDOFF_QUEUE_LIMIT);
        let (message_in, message_in_rx) = mpsc::channel(MESSAGE_QUEUE_LIMIT);

        let room = Arc::new(Room {
            room_id,
            type_id,
            secret_key: generate_secret(),
            roster: roster.clone(),
            logic_server,
            created_unix: unix_now(),
            close_flag: AtomicBool::new(false),
            exit_tx,
            session_in,
            session_out,
            message_in,
        });

        let game = Game::new(
            room_id,
            &roster,
            random_seed,
            room.created_unix,
            Arc::clone(&room) as Arc<dyn GameListener>,
        );

        let driver = RoomDriver {
            room: Arc::clone(&room),
            game,
            exit_rx,
            session_in_rx,
            session_out_rx,
            message_in_rx,
        };
        (room, driver)
    }

    pub fn id(&self) -> u64 {
        self.room_id
    }

    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    /// Shared secret for deployments that sign admission tokens per room.
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn created_unix(&self) -> i64 {
        self.created_unix
    }

    /// Whether the battle has finished (admission is refused after this).
    pub fn is_over(&self) -> bool {
        self.close_flag.load(Ordering::SeqCst)
    }

    /// Whether `player_id` is on the immutable roster.
    pub fn has_player(&self, player_id: u64) -> bool {
        self.roster.contains(&player_id)
    }

    /// Signals the driver to abort. Idempotent.
    pub fn stop(&self) {
        let _ = self.exit_tx.send(true);
    }
}

/// Session events do nothing but shove into the room's bounded queues; the
/// loop drains them on its next wake.
impl SessionCallback for Room {
    fn on_connect(&self, session: &Arc<Session>) -> bool {
        if self.is_over() {
            return false;
        }
        // Called at most once per session, so the handoff queue never
        // contends; a full queue here means the loop is gone.
        match self.session_in.try_send(Arc::clone(session)) {
            Ok(()) => {
                debug!(room_id = self.room_id, session = session.id(), "session handed off");
                true
            }
            Err(_) => {
                warn!(room_id = self.room_id, session = session.id(), "handoff refused");
                false
            }
        }
    }

    fn on_message(&self, session: &Arc<Session>, msg: Message) -> bool {
        let Some(player_id) = session.tag() else {
            error!(room_id = self.room_id, session = session.id(), "message without identity");
            return false;
        };
        if self.message_in.try_send((player_id, msg)).is_err() {
            warn!(room_id = self.room_id, player_id, "dropped inbound message");
        }
        true
    }

    fn on_close(&self, session: &Arc<Session>) {
        if self.session_out.try_send(Arc::clone(session)).is_err() {
            warn!(room_id = self.room_id, session = session.id(), "dropped departure event");
        }
    }
}

impl GameListener for Room {
    fn on_join(&self, _game_id: u64, player_id: u64) {
        info!(room_id = self.room_id, player_id, "joined game");
    }

    fn on_start(&self, _game_id: u64) {
        info!(room_id = self.room_id, "game started");
    }

    fn on_leave(&self, _game_id: u64, player_id: u64) {
        info!(room_id = self.room_id, player_id, "left game");
    }

    fn on_over(&self, _game_id: u64) {
        self.close_flag.store(true, Ordering::SeqCst);
        // Result delivery to the logic server is the operator's collaborator;
        // the relay only hands off.
        info!(
            room_id = self.room_id,
            logic_server = %self.logic_server,
            "game over"
        );
    }
}

/// Owns the game; runs until the game stops, the hard timeout fires, or the
/// registry forces an exit.
pub(crate) struct RoomDriver {
    room: Arc<Room>,
    game: Game,
    exit_rx: watch::Receiver<bool>,
    session_in_rx: mpsc::Receiver<Arc<Session>>,
    session_out_rx: mpsc::Receiver<Arc<Session>>,
    message_in_rx: mpsc::Receiver<(u64, Message)>,
}

impl RoomDriver {
    pub(crate) async fn run(mut self) {
        let room_id = self.room.room_id;
        let started = Instant::now();
        info!(room_id, "room running");

        let mut scheduler = TickScheduler::with_rate(TICK_HZ);
        let hard_timeout = time::sleep(ROOM_TIMEOUT);
        tokio::pin!(hard_timeout);

        let forced = loop {
            tokio::select! {
                _ = self.exit_rx.changed() => {
                    error!(room_id, "forced exit");
                    break true;
                }
                Some(session) = self.session_in_rx.recv() => {
                    let Some(player_id) = session.tag() else {
                        error!(room_id, session = session.id(), "handoff without identity");
                        session.close();
                        continue;
                    };
                    if self.game.join(player_id, Arc::clone(&session), unix_now()) {
                        info!(room_id, player_id, "player admitted to game");
                    } else {
                        error!(room_id, player_id, "join refused");
                        session.close();
                    }
                }
                Some(session) = self.session_out_rx.recv() => {
                    // An evicted session has no identity by the time its
                    // close event lands here; only a live departure counts.
                    if let Some(player_id) = session.tag() {
                        self.game.leave(player_id);
                    }
                }
                _ = scheduler.wait_for_tick() => {
                    if !self.game.tick(unix_now()) {
                        info!(room_id, "tick over");
                        break false;
                    }
                }
                () = &mut hard_timeout => {
                    error!(room_id, "room timed out");
                    break false;
                }
                Some((player_id, msg)) = self.message_in_rx.recv() => {
                    self.game.process_msg(player_id, &msg, unix_now());
                }
            }
        };

        if !forced {
            self.game.close();
            for remaining in (1..=CLOSE_GRACE_SECS).rev() {
                time::sleep(Duration::from_secs(1)).await;
                debug!(room_id, remaining, "closing");
            }
        }
        self.game.cleanup();
        info!(
            room_id,
            elapsed_secs = started.elapsed().as_secs(),
            "room finished"
        );
    }
}

/// Random 32-hex-char room secret.
fn generate_secret() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
