//! Per-seat player state.

use std::sync::Arc;

use lockstep_net::Session;
use lockstep_wire::Message;

use crate::BAD_NETWORK_SECS;

/// One roster seat: readiness, liveness, delivery cursor, and the session
/// currently occupying it (if any). Exists for every roster member from room
/// creation; the seat index never changes.
#[derive(Debug)]
pub struct Player {
    id: u64,
    seat: i32,
    ready: bool,
    online: bool,
    loading_progress: i32,
    last_heartbeat_unix: i64,
    delivered_cursor: u32,
    session: Option<Arc<Session>>,
}

impl Player {
    /// A seat for `id`, not yet occupied. `seat` is 1-based.
    pub fn new(id: u64, seat: i32) -> Self {
        Self {
            id,
            seat,
            ready: false,
            online: false,
            loading_progress: 0,
            last_heartbeat_unix: 0,
            delivered_cursor: 0,
            session: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn seat(&self) -> i32 {
        self.seat
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn loading_progress(&self) -> i32 {
        self.loading_progress
    }

    pub fn set_loading_progress(&mut self, progress: i32) {
        self.loading_progress = progress;
    }

    /// Attaches a session: the seat is occupied, immediately ready, and its
    /// liveness clock starts at `now_unix`.
    pub fn connect(&mut self, session: Arc<Session>, now_unix: i64) {
        self.session = Some(session);
        self.online = true;
        self.ready = true;
        self.last_heartbeat_unix = now_unix;
    }

    /// Detaches the current session without closing it; the caller owns the
    /// eviction protocol (clear the tag, then close).
    pub fn take_session(&mut self) -> Option<Arc<Session>> {
        self.session.take()
    }

    pub fn refresh_heartbeat(&mut self, now_unix: i64) {
        self.last_heartbeat_unix = now_unix;
    }

    pub fn last_heartbeat_unix(&self) -> i64 {
        self.last_heartbeat_unix
    }

    /// Whether broadcasts to this player are currently suppressed.
    pub fn is_bad_network(&self, now_unix: i64) -> bool {
        now_unix - self.last_heartbeat_unix >= BAD_NETWORK_SECS
    }

    pub fn delivered_cursor(&self) -> u32 {
        self.delivered_cursor
    }

    pub fn set_delivered_cursor(&mut self, frame: u32) {
        self.delivered_cursor = frame;
    }

    /// Enqueues a message on the player's session without waiting. Any
    /// failure closes the session: a client that can't drain its queue is
    /// dropped rather than allowed to stall the room loop.
    pub fn send(&self, msg: Message) {
        if !self.online {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        if let Err(e) = session.try_send(msg) {
            tracing::warn!(
                player_id = self.id,
                session = session.id(),
                error = %e,
                "send failed, dropping client"
            );
            session.close();
        }
    }

    /// Closes the session (if any) and vacates the seat.
    pub fn cleanup(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
        self.online = false;
        self.ready = false;
    }

    /// Marks the seat occupied without a session. State-machine tests drive
    /// liveness through this; `send` is a no-op for such a player.
    #[cfg(test)]
    pub(crate) fn force_online(&mut self, now_unix: i64) {
        self.online = true;
        self.ready = true;
        self.last_heartbeat_unix = now_unix;
    }
}
