//! Composition root: registry + router + listener.

use std::net::SocketAddr;
use std::sync::Arc;

use lockstep_net::{NetServer, NetStopper, SessionConfig};
use lockstep_room::RoomRegistry;
use tokio::task::JoinHandle;

use crate::{AcceptAll, Router, ServerError, TokenVerifier};

/// A running relay server.
///
/// Owns the room registry (the factory the admin surface drives) and the
/// accept loop with the [`Router`] installed as the pre-admission callback.
pub struct LockstepServer {
    registry: Arc<RoomRegistry>,
    router: Arc<Router>,
    stopper: NetStopper,
    net_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl LockstepServer {
    /// Binds with the development token verifier (accepts any token).
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        Self::bind_with(addr, Arc::new(AcceptAll)).await
    }

    /// Binds with a custom token verifier.
    pub async fn bind_with(
        addr: &str,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Result<Self, ServerError> {
        let registry = Arc::new(RoomRegistry::new());
        let router = Arc::new(Router::new(Arc::clone(&registry), verifier));
        let net = NetServer::bind(
            addr,
            Arc::clone(&router) as Arc<dyn lockstep_net::SessionCallback>,
            SessionConfig::default(),
        )
        .await?;
        let local_addr = net.local_addr()?;
        let stopper = net.stopper();
        let net_task = tokio::spawn(net.run());

        Ok(Self {
            registry,
            router,
            stopper,
            net_task,
            local_addr,
        })
    }

    /// The room factory: the admin surface creates battles through this.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// The bound listen address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Pre-admission connection gauge.
    pub fn total_conn(&self) -> i64 {
        self.router.total_conn()
    }

    /// Coordinated shutdown: rooms first, then the listener and every
    /// session worker.
    pub async fn stop(self) {
        self.registry.stop_all().await;
        self.stopper.stop();
        let _ = self.net_task.await;
    }
}
