//! Listener loop -- accept TCP connections, spawn one session per socket.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::session::{Session, SessionContext};

/// Pause after a failed accept. Errors like EMFILE persist until sessions
/// release descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Listener {
    inner: TcpListener,
    ctx: SessionContext,
    sessions: TaskTracker,
}

impl Listener {
    pub async fn bind(addr: &str, ctx: SessionContext, sessions: TaskTracker) -> std::io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self {
            inner,
            ctx,
            sessions,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Run the accept loop until `shutdown` fires. Each connection is
    /// registered before its session task is spawned. Accept errors are
    /// logged and the loop retries after `ACCEPT_BACKOFF`. The listening
    /// socket is closed when this returns.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("listener: shutdown signal, stopping accept loop");
                    break;
                }
                accepted = self.inner.accept() => match accepted {
                    Ok((stream, remote)) => {
                        tracing::info!(%remote, "listener: accepted connection");
                        let session = Session::accept(stream, remote, &self.ctx).await;
                        self.sessions.spawn(session.run(shutdown.clone()));
                    }
                    Err(e) => {
                        tracing::warn!("listener: failed to accept connection: {e}");
                        if !backoff(&shutdown).await {
                            tracing::info!("listener: shutdown signal, stopping accept loop");
                            break;
                        }
                    }
                },
            }
        }
    }
}

/// Sleep for `ACCEPT_BACKOFF`. Returns `false` if shutdown fired first.
async fn backoff(shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}
