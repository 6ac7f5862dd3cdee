//! Accept loop: owns the listening socket, starts session workers.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::{NetError, Session, SessionCallback, SessionConfig};

/// The accept loop. Wraps each accepted connection in a [`Session`], invokes
/// its `on_connect`, and starts its workers. Stops cleanly on the exit
/// signal: the listening socket closes and every session worker is awaited.
pub struct NetServer {
    listener: TcpListener,
    config: SessionConfig,
    callback: Arc<dyn SessionCallback>,
    exit_tx: Arc<watch::Sender<bool>>,
}

/// Handle for signalling the accept loop (and every session) to shut down.
#[derive(Clone)]
pub struct NetStopper(Arc<watch::Sender<bool>>);

impl NetStopper {
    /// Signals shutdown. Idempotent.
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

impl NetServer {
    /// Binds the listener.
    pub async fn bind(
        addr: &str,
        callback: Arc<dyn SessionCallback>,
        config: SessionConfig,
    ) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr).await?;
        let (exit_tx, _) = watch::channel(false);
        tracing::info!(addr, "listener bound");
        Ok(Self {
            listener,
            config,
            callback,
            exit_tx: Arc::new(exit_tx),
        })
    }

    /// The bound local address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    /// A handle that stops this server and its sessions.
    pub fn stopper(&self) -> NetStopper {
        NetStopper(Arc::clone(&self.exit_tx))
    }

    /// Runs the accept loop until the exit signal fires, then waits for all
    /// session workers to finish.
    pub async fn run(self) {
        let mut exit = self.exit_tx.subscribe();
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = exit.changed() => break,
                // Reap finished session workers so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            configure_stream(&stream);
                            if let Some(session) = Session::spawn(
                                stream,
                                peer,
                                Arc::clone(&self.callback),
                                &self.config,
                                self.exit_tx.subscribe(),
                                &mut tasks,
                            ) {
                                tracing::debug!(session = session.id(), %peer, "session started");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                    }
                }
            }
        }

        // Listener closes here; sessions observe the same exit signal.
        drop(self.listener);
        while tasks.join_next().await.is_some() {}
        tracing::info!("listener stopped");
    }
}

/// The single place per-connection transport options are applied.
///
/// No-delay streaming for prompt small writes; window and buffer sizing
/// belong to the session-transport provider in front of this listener.
fn configure_stream(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::warn!(error = %e, "set_nodelay failed");
    }
}
