//! Integration tests for the session layer against a real loopback listener.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lockstep_net::{NetError, NetServer, Session, SessionCallback, SessionConfig};
use lockstep_wire::{encode, Message, MessageKind, HEADER_LEN};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// =========================================================================
// Test callback: counts lifecycle events and echoes every message.
// =========================================================================

#[derive(Default)]
struct EchoCallback {
    conns: AtomicU32,
    msgs: AtomicU32,
    closes: AtomicU32,
    sessions: Mutex<Vec<Arc<Session>>>,
    reject: bool,
}

impl SessionCallback for EchoCallback {
    fn on_connect(&self, session: &Arc<Session>) -> bool {
        if self.reject {
            return false;
        }
        self.conns.fetch_add(1, Ordering::SeqCst);
        self.sessions.lock().unwrap().push(Arc::clone(session));
        true
    }

    fn on_message(&self, session: &Arc<Session>, msg: Message) -> bool {
        self.msgs.fetch_add(1, Ordering::SeqCst);
        session.try_send(msg).is_ok()
    }

    fn on_close(&self, _session: &Arc<Session>) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// =========================================================================
// Helpers
// =========================================================================

async fn start_server(
    callback: Arc<EchoCallback>,
    config: SessionConfig,
) -> (String, lockstep_net::NetStopper, tokio::task::JoinHandle<()>) {
    let server = NetServer::bind("127.0.0.1:0", callback, config)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let stopper = server.stopper();
    let handle = tokio::spawn(server.run());
    (addr, stopper, handle)
}

async fn read_reply(stream: &mut TcpStream) -> Message {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await.unwrap();
    let len = u16::from_be_bytes([header[0], header[1]]) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    Message {
        kind: header[2],
        payload,
    }
}

async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

// =========================================================================
// Echo round trips
// =========================================================================

#[tokio::test]
async fn test_many_clients_echo_and_counted() {
    let cb = Arc::new(EchoCallback::default());
    let (addr, stopper, handle) =
        start_server(Arc::clone(&cb), SessionConfig::default()).await;

    const CLIENTS: u32 = 20;
    let mut joins = Vec::new();
    for i in 0..CLIENTS {
        let addr = addr.clone();
        joins.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(&addr).await.unwrap();
            let payload = format!("ping-{i}").into_bytes();
            stream
                .write_all(&encode(MessageKind::End, &payload))
                .await
                .unwrap();
            let reply = read_reply(&mut stream).await;
            assert_eq!(reply.message_kind(), Some(MessageKind::End));
            assert_eq!(reply.payload, payload);
        }));
    }
    for j in joins {
        j.await.unwrap();
    }

    wait_until("all closes", || {
        cb.closes.load(Ordering::SeqCst) == CLIENTS
    })
    .await;
    assert_eq!(cb.conns.load(Ordering::SeqCst), CLIENTS);
    assert_eq!(cb.msgs.load(Ordering::SeqCst), CLIENTS);

    stopper.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_empty_payload_echoes() {
    let cb = Arc::new(EchoCallback::default());
    let (addr, stopper, handle) =
        start_server(Arc::clone(&cb), SessionConfig::default()).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(&encode(MessageKind::Heartbeat, &[]))
        .await
        .unwrap();
    let reply = read_reply(&mut stream).await;
    assert_eq!(reply.message_kind(), Some(MessageKind::Heartbeat));
    assert!(reply.payload.is_empty());

    stopper.stop();
    handle.await.unwrap();
}

// =========================================================================
// Close semantics
// =========================================================================

#[tokio::test]
async fn test_close_fires_on_close_exactly_once() {
    let cb = Arc::new(EchoCallback::default());
    let (addr, stopper, handle) =
        start_server(Arc::clone(&cb), SessionConfig::default()).await;

    let _stream = TcpStream::connect(&addr).await.unwrap();
    wait_until("session registered", || {
        !cb.sessions.lock().unwrap().is_empty()
    })
    .await;

    let session = cb.sessions.lock().unwrap()[0].clone();
    for _ in 0..5 {
        session.close();
    }
    assert!(session.is_closed());
    assert_eq!(cb.closes.load(Ordering::SeqCst), 1);

    stopper.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_try_send_on_closed_session_fails() {
    let cb = Arc::new(EchoCallback::default());
    let (addr, stopper, handle) =
        start_server(Arc::clone(&cb), SessionConfig::default()).await;

    let _stream = TcpStream::connect(&addr).await.unwrap();
    wait_until("session registered", || {
        !cb.sessions.lock().unwrap().is_empty()
    })
    .await;

    let session = cb.sessions.lock().unwrap()[0].clone();
    session.close();
    let result = session.try_send(Message::empty(MessageKind::Heartbeat));
    assert!(matches!(result, Err(NetError::Closed)));

    stopper.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_client_disconnect_closes_session() {
    let cb = Arc::new(EchoCallback::default());
    let (addr, stopper, handle) =
        start_server(Arc::clone(&cb), SessionConfig::default()).await;

    {
        let mut stream = TcpStream::connect(&addr).await.unwrap();
        stream
            .write_all(&encode(MessageKind::End, b"bye"))
            .await
            .unwrap();
        let _ = read_reply(&mut stream).await;
        // Stream drops here.
    }

    wait_until("close after disconnect", || {
        cb.closes.load(Ordering::SeqCst) == 1
    })
    .await;

    stopper.stop();
    handle.await.unwrap();
}

// =========================================================================
// Fatal framing and deadlines
// =========================================================================

#[tokio::test]
async fn test_oversize_frame_terminates_session() {
    let cb = Arc::new(EchoCallback::default());
    let (addr, stopper, handle) =
        start_server(Arc::clone(&cb), SessionConfig::default()).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    // Header announces 600 bytes: over the 512 ceiling.
    let mut bad = 600u16.to_be_bytes().to_vec();
    bad.push(MessageKind::Input as u8);
    stream.write_all(&bad).await.unwrap();

    wait_until("close after oversize frame", || {
        cb.closes.load(Ordering::SeqCst) == 1
    })
    .await;
    // Server closed its end; the client read hits EOF.
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);

    stopper.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_idle_session_hits_read_deadline() {
    let cb = Arc::new(EchoCallback::default());
    let config = SessionConfig {
        read_timeout: Duration::from_millis(100),
        ..SessionConfig::default()
    };
    let (addr, stopper, handle) = start_server(Arc::clone(&cb), config).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    // Send nothing: the reader's deadline terminates the session.
    wait_until("close after read deadline", || {
        cb.closes.load(Ordering::SeqCst) == 1
    })
    .await;
    let mut buf = [0u8; 1];
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);

    stopper.stop();
    handle.await.unwrap();
}

// =========================================================================
// Rejection and shutdown
// =========================================================================

#[tokio::test]
async fn test_rejected_connection_never_closes() {
    let cb = Arc::new(EchoCallback {
        reject: true,
        ..EchoCallback::default()
    });
    let (addr, stopper, handle) =
        start_server(Arc::clone(&cb), SessionConfig::default()).await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    let mut buf = [0u8; 1];
    // The server drops the stream without starting workers.
    assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    assert_eq!(cb.conns.load(Ordering::SeqCst), 0);
    assert_eq!(cb.closes.load(Ordering::SeqCst), 0);

    stopper.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_stop_terminates_accept_loop_and_sessions() {
    let cb = Arc::new(EchoCallback::default());
    let (addr, stopper, handle) =
        start_server(Arc::clone(&cb), SessionConfig::default()).await;

    let _stream = TcpStream::connect(&addr).await.unwrap();
    wait_until("session registered", || {
        cb.conns.load(Ordering::SeqCst) == 1
    })
    .await;

    stopper.stop();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("accept loop should stop promptly")
        .unwrap();
    assert_eq!(cb.closes.load(Ordering::SeqCst), 1);
}
