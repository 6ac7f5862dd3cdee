//! One live connection: bounded mailboxes, three workers, idempotent close.
//!
//! Worker layout per session:
//!
//! - **reader**: reads framed messages off the socket under a per-read
//!   deadline and pushes them into the inbound mailbox. Exits on any decode
//!   or transport error.
//! - **writer**: pops the outbound mailbox and writes serialised bytes under
//!   a per-write deadline. Exits on any write error.
//! - **handler**: pops the inbound mailbox and invokes the callback's
//!   `on_message`; a `false` return closes the session.
//!
//! Every worker exit funnels through [`Session::close`], which is guarded so
//! teardown (including the `on_close` callback) runs exactly once no matter
//! which worker observes the terminal condition first.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use lockstep_wire::{decode_header, Message, HEADER_LEN};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time;

use crate::NetError;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Mailbox capacities and I/O deadlines for every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Outbound mailbox capacity.
    pub send_queue_limit: usize,
    /// Inbound mailbox capacity.
    pub recv_queue_limit: usize,
    /// Deadline for reading one complete message.
    pub read_timeout: Duration,
    /// Deadline for writing one complete message.
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_queue_limit: 1024,
            recv_queue_limit: 1024,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// The capability set a session owner implements.
///
/// Implementations must not block: they run on the session's handler worker
/// and are expected to do nothing beyond shoving into bounded queues or
/// replying with [`Session::try_send`].
pub trait SessionCallback: Send + Sync + 'static {
    /// Called once when the connection is accepted. Returning `false`
    /// rejects the session before its workers start.
    fn on_connect(&self, session: &Arc<Session>) -> bool;

    /// Called for every inbound message, in arrival order. Returning `false`
    /// closes the session.
    fn on_message(&self, session: &Arc<Session>, msg: Message) -> bool;

    /// Called exactly once when the session reaches its terminal state.
    fn on_close(&self, session: &Arc<Session>);
}

/// One live transport connection.
pub struct Session {
    id: u64,
    peer: SocketAddr,
    /// Self-handle so the close path can pass an owned reference to
    /// `on_close` regardless of which worker got there first.
    weak: Weak<Session>,
    outbound: mpsc::Sender<Message>,
    close_flag: AtomicBool,
    close_tx: watch::Sender<bool>,
    /// Identity slot the router stamps at admission. Last writer wins; the
    /// eviction path clears it before closing a replaced session so the
    /// stale close event carries no identity.
    tag: Mutex<Option<u64>>,
    /// Swappable owner: the router until admission, the room after handoff.
    callback: RwLock<Arc<dyn SessionCallback>>,
}

impl Session {
    /// Wraps an accepted stream, runs `on_connect`, and starts the three
    /// workers. Returns `None` when the callback rejects the connection
    /// (the stream is dropped, closing it).
    pub fn spawn(
        stream: TcpStream,
        peer: SocketAddr,
        callback: Arc<dyn SessionCallback>,
        config: &SessionConfig,
        exit: watch::Receiver<bool>,
        tasks: &mut JoinSet<()>,
    ) -> Option<Arc<Session>> {
        let (out_tx, out_rx) = mpsc::channel(config.send_queue_limit);
        let (in_tx, in_rx) = mpsc::channel(config.recv_queue_limit);
        let (close_tx, close_rx) = watch::channel(false);

        let session = Arc::new_cyclic(|weak| Session {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            peer,
            weak: weak.clone(),
            outbound: out_tx,
            close_flag: AtomicBool::new(false),
            close_tx,
            tag: Mutex::new(None),
            callback: RwLock::new(callback),
        });

        if !session.callback_handle().on_connect(&session) {
            tracing::debug!(session = session.id, %peer, "connection rejected");
            return None;
        }

        let (rd, wr) = stream.into_split();

        // Reader.
        {
            let sess = Arc::clone(&session);
            let mut exit = exit.clone();
            let mut close = close_rx.clone();
            let timeout = config.read_timeout;
            tasks.spawn(async move {
                let mut rd = rd;
                loop {
                    tokio::select! {
                        _ = exit.changed() => break,
                        _ = close.changed() => break,
                        read = time::timeout(timeout, read_message(&mut rd)) => {
                            let msg = match read {
                                Ok(Ok(msg)) => msg,
                                Ok(Err(e)) => {
                                    tracing::debug!(session = sess.id, error = %e, "read failed");
                                    break;
                                }
                                Err(_) => {
                                    tracing::debug!(session = sess.id, "read deadline exceeded");
                                    break;
                                }
                            };
                            // A full inbound mailbox exerts back-pressure on
                            // the socket, not on the owner loop.
                            tokio::select! {
                                _ = close.changed() => break,
                                pushed = in_tx.send(msg) => {
                                    if pushed.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                sess.close();
            });
        }

        // Writer.
        {
            let sess = Arc::clone(&session);
            let mut exit = exit.clone();
            let mut close = close_rx.clone();
            let timeout = config.write_timeout;
            tasks.spawn(async move {
                let mut wr = wr;
                let mut out_rx = out_rx;
                loop {
                    tokio::select! {
                        _ = exit.changed() => break,
                        _ = close.changed() => break,
                        popped = out_rx.recv() => {
                            let Some(msg) = popped else { break };
                            match time::timeout(timeout, wr.write_all(&msg.encode())).await {
                                Ok(Ok(())) => {}
                                Ok(Err(e)) => {
                                    tracing::debug!(session = sess.id, error = %e, "write failed");
                                    break;
                                }
                                Err(_) => {
                                    tracing::debug!(session = sess.id, "write deadline exceeded");
                                    break;
                                }
                            }
                        }
                    }
                }
                sess.close();
            });
        }

        // Handler.
        {
            let sess = Arc::clone(&session);
            let mut exit = exit;
            let mut close = close_rx;
            tasks.spawn(async move {
                let mut in_rx = in_rx;
                loop {
                    tokio::select! {
                        _ = exit.changed() => break,
                        _ = close.changed() => break,
                        popped = in_rx.recv() => {
                            let Some(msg) = popped else { break };
                            if !sess.callback_handle().on_message(&sess, msg) {
                                break;
                            }
                        }
                    }
                }
                sess.close();
            });
        }

        Some(session)
    }

    /// This session's process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The remote address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.close_flag.load(Ordering::SeqCst)
    }

    /// Stamps (or clears) the identity tag. Last writer wins.
    pub fn set_tag(&self, player_id: Option<u64>) {
        *self.tag.lock().expect("session tag lock poisoned") = player_id;
    }

    /// The identity tag, if the router stamped one.
    pub fn tag(&self) -> Option<u64> {
        *self.tag.lock().expect("session tag lock poisoned")
    }

    /// Replaces the session owner. Messages already queued are delivered to
    /// the new callback.
    pub fn set_callback(&self, callback: Arc<dyn SessionCallback>) {
        *self
            .callback
            .write()
            .expect("session callback lock poisoned") = callback;
    }

    fn callback_handle(&self) -> Arc<dyn SessionCallback> {
        Arc::clone(
            &self
                .callback
                .read()
                .expect("session callback lock poisoned"),
        )
    }

    /// Enqueues a message without waiting. Fails with
    /// [`NetError::WouldBlock`] when the outbound mailbox is full and
    /// [`NetError::Closed`] when the session is closed.
    pub fn try_send(&self, msg: Message) -> Result<(), NetError> {
        if self.is_closed() {
            return Err(NetError::Closed);
        }
        self.outbound.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NetError::WouldBlock,
            mpsc::error::TrySendError::Closed(_) => NetError::Closed,
        })
    }

    /// Enqueues a message, waiting up to `timeout` for mailbox space. A zero
    /// timeout behaves exactly like [`try_send`](Self::try_send). Never
    /// blocks the caller past the requested timeout.
    pub async fn send_timeout(
        &self,
        msg: Message,
        timeout: Duration,
    ) -> Result<(), NetError> {
        if timeout.is_zero() {
            return self.try_send(msg);
        }
        if self.is_closed() {
            return Err(NetError::Closed);
        }
        match time::timeout(timeout, self.outbound.send(msg)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(NetError::Closed),
            Err(_) => Err(NetError::WouldBlock),
        }
    }

    /// Closes the session: signals all workers and fires `on_close`.
    ///
    /// Idempotent and safe to call from any worker or owner; the teardown
    /// path runs exactly once.
    pub fn close(&self) {
        if self.close_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.close_tx.send(true);
        tracing::debug!(session = self.id, peer = %self.peer, "session closed");
        if let Some(me) = self.weak.upgrade() {
            self.callback_handle().on_close(&me);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Reads exactly one framed message: fixed header, then the announced
/// payload. The caller wraps this in the per-read deadline.
async fn read_message(rd: &mut OwnedReadHalf) -> Result<Message, NetError> {
    let mut header = [0u8; HEADER_LEN];
    rd.read_exact(&mut header).await?;
    let (len, kind) = decode_header(header)?;
    let mut payload = vec![0u8; len];
    if len > 0 {
        rd.read_exact(&mut payload).await?;
    }
    Ok(Message { kind, payload })
}
