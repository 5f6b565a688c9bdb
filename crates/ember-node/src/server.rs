//! Server -- owns the registry, router, listener and session tracking.
//!
//! Constructed explicitly and handed to whoever needs it (main, the admin
//! console, tests); there is no process-wide instance.

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::RelayConfig;
use crate::listener::Listener;
use crate::peer_registry::PeerRegistry;
use crate::router::Router;
use crate::session::SessionContext;

/// Cloneable trigger for graceful shutdown.
#[derive(Clone, Debug, Default)]
pub struct ShutdownHandle(CancellationToken);

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.0.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn triggered(&self) {
        self.0.cancelled().await
    }

    fn token(&self) -> CancellationToken {
        self.0.clone()
    }
}

pub struct Server {
    config: RelayConfig,
    router: Router,
    listener: Listener,
    sessions: TaskTracker,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Bind the listening socket. This is the only fatal error path.
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        let registry = PeerRegistry::new();
        let router = Router::new(registry);
        let ctx = SessionContext::new(&config.server.name, router.clone(), &config.session);
        let sessions = TaskTracker::new();

        let listener = Listener::bind(&config.server.listen_addr, ctx, sessions.clone())
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", config.server.listen_addr))?;

        let local_addr = listener.local_addr()?;
        tracing::info!(
            listen = %local_addr,
            name = %config.server.name,
            "server: listening"
        );

        Ok(Self {
            config,
            router,
            listener,
            sessions,
            shutdown: ShutdownHandle::default(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn registry(&self) -> PeerRegistry {
        self.router.registry().clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown is triggered, then close the
    /// listening socket and wait for sessions to finish, bounded by the
    /// configured drain timeout.
    pub async fn run(self) -> anyhow::Result<()> {
        let Server {
            config,
            listener,
            sessions,
            shutdown,
            ..
        } = self;

        listener.run(shutdown.token()).await;

        sessions.close();
        tracing::info!(sessions = sessions.len(), "server: draining sessions");
        if tokio::time::timeout(config.drain_timeout(), sessions.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                sessions = sessions.len(),
                "server: drain timeout, abandoning remaining sessions"
            );
        }

        tracing::info!("server: terminated");
        Ok(())
    }
}
