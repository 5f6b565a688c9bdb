//! Connection session -- owns one accepted TCP connection.
//!
//! Two tasks per peer:
//!   - reader (the session itself): FramedRead over the read half, each
//!     complete frame goes to the router
//!   - writer: drains the peer's outbound queue into the write half; the
//!     only code that writes to this socket
//!
//! The session ends on end-of-stream, a read error, or server shutdown, and
//! is the only path that removes a peer from the registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ember_protocol::{messages, FrameCodec, PeerId};
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use crate::config::SessionSection;
use crate::peer_registry::PeerHandle;
use crate::router::Router;

/// Everything a session needs from the server, cheap to clone per connection.
#[derive(Clone)]
pub struct SessionContext {
    pub server_name: Arc<str>,
    pub router: Router,
    pub read_buffer_bytes: usize,
    pub outbound_queue: usize,
}

impl SessionContext {
    pub fn new(server_name: &str, router: Router, cfg: &SessionSection) -> Self {
        Self {
            server_name: Arc::from(server_name),
            router,
            read_buffer_bytes: cfg.read_buffer_bytes,
            outbound_queue: cfg.outbound_queue.max(1),
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    EndOfStream,
    ReadError,
    Shutdown,
}

pub struct Session {
    peer_id: PeerId,
    remote: SocketAddr,
    stream: TcpStream,
    outbound: mpsc::Receiver<Bytes>,
    ctx: SessionContext,
}

impl Session {
    /// Assign an identity to a fresh connection, queue its welcome frame and
    /// register it. The welcome is queued before registration so it is
    /// always the first frame the peer sees.
    pub async fn accept(stream: TcpStream, remote: SocketAddr, ctx: &SessionContext) -> Self {
        let peer_id = PeerId::random();
        let (tx, rx) = mpsc::channel(ctx.outbound_queue);
        let handle = PeerHandle::new(peer_id, Some(remote), tx);

        if let Err(e) = handle.deliver_text(&messages::welcome(&ctx.server_name, peer_id)) {
            tracing::warn!(peer = %peer_id, "session: welcome not queued: {e}");
        }
        ctx.router.registry().register(handle).await;

        Self {
            peer_id,
            remote,
            stream,
            outbound: rx,
            ctx: ctx.clone(),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Run the read loop until the connection ends, then close the socket
    /// and unregister.
    pub async fn run(self, shutdown: CancellationToken) -> SessionEnd {
        let Session {
            peer_id,
            remote,
            stream,
            outbound,
            ctx,
        } = self;

        let (read_half, write_half) = stream.into_split();
        let stop_writer = CancellationToken::new();
        let writer = tokio::spawn(write_loop(
            peer_id,
            write_half,
            outbound,
            stop_writer.clone(),
        ));

        let mut frames = FramedRead::with_capacity(read_half, FrameCodec, ctx.read_buffer_bytes);
        tracing::info!(peer = %peer_id, %remote, "session: started");

        let end = loop {
            tokio::select! {
                next = frames.next() => match next {
                    Some(Ok(payload)) => {
                        // Zero-length frame: nothing usable
                        if payload.is_empty() {
                            continue;
                        }
                        ctx.router.route(peer_id, &payload).await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(peer = %peer_id, %remote, "session: read failed: {e}");
                        break SessionEnd::ReadError;
                    }
                    None => break SessionEnd::EndOfStream,
                },
                _ = shutdown.cancelled() => break SessionEnd::Shutdown,
            }
        };

        ctx.router.registry().unregister(&peer_id).await;
        stop_writer.cancel();
        if let Err(e) = writer.await {
            tracing::warn!(peer = %peer_id, "session: writer task failed: {e}");
        }
        drop(frames);

        tracing::info!(peer = %peer_id, %remote, reason = ?end, "session: closed");
        end
    }
}

/// Upper bound on flushing frames still queued when the session stops.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Write queued frames to the socket until stopped, the queue closes, or a
/// write fails. On stop the queue is closed and whatever was already queued
/// is still written, bounded by `FLUSH_TIMEOUT`. Dropping the receiver on
/// exit makes later deliveries to this peer fail fast.
async fn write_loop(
    peer_id: PeerId,
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Bytes>,
    stop: CancellationToken,
) {
    let mut writable = true;
    loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = write_half.write_all(&frame).await {
                    tracing::debug!(peer = %peer_id, "session: write failed: {e}");
                    writable = false;
                    break;
                }
            }
            _ = stop.cancelled() => break,
        }
    }

    outbound.close();
    if writable {
        let flush = async {
            while let Some(frame) = outbound.recv().await {
                write_half.write_all(&frame).await?;
            }
            Ok::<_, std::io::Error>(())
        };
        match tokio::time::timeout(FLUSH_TIMEOUT, flush).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(peer = %peer_id, "session: flush failed: {e}"),
            Err(_) => tracing::debug!(peer = %peer_id, "session: flush timed out"),
        }
    }

    if let Err(e) = write_half.shutdown().await {
        tracing::debug!(peer = %peer_id, "session: socket shutdown: {e}");
    }
}
