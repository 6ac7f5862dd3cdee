//! Pre-admission message dispatch.
//!
//! Every accepted session lands here first. The router answers liveness
//! probes, validates `Connect` intents against the room registry, and on
//! success stamps the session with the player's identity and hands it to
//! the target room. From that moment the room owns the session.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use lockstep_net::{Session, SessionCallback};
use lockstep_room::RoomRegistry;
use lockstep_wire::proto::{ConnectAck, ConnectCode, ConnectReq};
use lockstep_wire::{Codec, JsonCodec, Message, MessageKind};
use tracing::{debug, error, warn};

/// Admission token check. Pluggable so deployments can wire their real
/// auth integration in.
pub trait TokenVerifier: Send + Sync + 'static {
    fn verify(&self, player_id: u64, token: &str) -> bool;
}

/// Accepts any token. Placeholder until the auth integration lands.
pub struct AcceptAll;

impl TokenVerifier for AcceptAll {
    fn verify(&self, _player_id: u64, _token: &str) -> bool {
        true
    }
}

/// The pre-admission callback installed on every fresh session.
pub struct Router {
    registry: Arc<RoomRegistry>,
    verifier: Arc<dyn TokenVerifier>,
    codec: JsonCodec,
    total_conn: AtomicI64,
}

impl Router {
    pub fn new(registry: Arc<RoomRegistry>, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            registry,
            verifier,
            codec: JsonCodec,
            total_conn: AtomicI64::new(0),
        }
    }

    /// Sessions currently in pre-admission (plus admitted sessions whose
    /// close the router never sees; rooms own those).
    pub fn total_conn(&self) -> i64 {
        self.total_conn.load(Ordering::SeqCst)
    }

    fn reply(&self, session: &Arc<Session>, code: ConnectCode) {
        match self.codec.encode(&ConnectAck { code }) {
            Ok(payload) => {
                if let Err(e) = session.try_send(Message::new(MessageKind::Connect, payload)) {
                    debug!(session = session.id(), error = %e, "connect reply dropped");
                }
            }
            Err(e) => error!(error = %e, "encode connect reply failed"),
        }
    }

    /// Validates the admission intent. Failed admissions keep the session
    /// open so the client may retry; only an unreadable request closes it.
    fn handle_connect(&self, session: &Arc<Session>, msg: &Message) -> bool {
        let req: ConnectReq = match self.codec.decode(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!(session = session.id(), error = %e, "bad connect payload");
                return false;
            }
        };

        let Some(room) = self.registry.get(req.battle_id) else {
            warn!(player_id = req.player_id, battle_id = req.battle_id, "no such room");
            self.reply(session, ConnectCode::NoRoom);
            return true;
        };
        if room.is_over() {
            warn!(player_id = req.player_id, battle_id = req.battle_id, "room is over");
            self.reply(session, ConnectCode::RoomState);
            return true;
        }
        if !room.has_player(req.player_id) {
            warn!(player_id = req.player_id, battle_id = req.battle_id, "not on roster");
            self.reply(session, ConnectCode::NoPlayer);
            return true;
        }
        if !self.verifier.verify(req.player_id, &req.token) {
            warn!(player_id = req.player_id, battle_id = req.battle_id, "token rejected");
            self.reply(session, ConnectCode::BadToken);
            return true;
        }

        self.reply(session, ConnectCode::Ok);
        session.set_tag(Some(req.player_id));
        session.set_callback(Arc::clone(&room) as Arc<dyn SessionCallback>);
        debug!(
            session = session.id(),
            player_id = req.player_id,
            battle_id = req.battle_id,
            "admitted, handing off"
        );
        room.on_connect(session)
    }
}

impl SessionCallback for Router {
    fn on_connect(&self, session: &Arc<Session>) -> bool {
        let total = self.total_conn.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(session = session.id(), peer = %session.peer(), total, "connected");
        true
    }

    fn on_message(&self, session: &Arc<Session>, msg: Message) -> bool {
        match msg.message_kind() {
            Some(MessageKind::Connect) => self.handle_connect(session, &msg),
            Some(MessageKind::Heartbeat) => {
                session.try_send(Message::empty(MessageKind::Heartbeat)).is_ok()
            }
            Some(MessageKind::End) => {
                // Debug probe: echo the payload back untouched.
                session
                    .try_send(Message::new(MessageKind::End, msg.payload))
                    .is_ok()
            }
            _ => {
                warn!(session = session.id(), kind = msg.kind, "unexpected pre-admission message");
                false
            }
        }
    }

    fn on_close(&self, session: &Arc<Session>) {
        let total = self.total_conn.fetch_sub(1, Ordering::SeqCst) - 1;
        debug!(session = session.id(), total, "closed");
    }
}
