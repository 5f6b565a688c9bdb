//! Peer registry -- thread-safe directory of connected peers.
//!
//! Maps PeerId → PeerHandle. Each handle carries the sending side of that
//! peer's outbound queue; the peer's writer task is the only thing that
//! touches the socket, so frames to one peer never interleave.

use bytes::Bytes;
use ember_protocol::{PeerId, ProtocolError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue full")]
    QueueFull,
    #[error("peer writer closed")]
    Closed,
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}

/// Write capability for one connected peer.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    pub peer_id: PeerId,
    pub remote: Option<SocketAddr>,
    outbound: mpsc::Sender<Bytes>,
}

impl PeerHandle {
    pub fn new(peer_id: PeerId, remote: Option<SocketAddr>, outbound: mpsc::Sender<Bytes>) -> Self {
        Self {
            peer_id,
            remote,
            outbound,
        }
    }

    /// Queue an already-encoded frame. Never waits: a full queue is a
    /// delivery failure, not a reason to stall the caller.
    pub fn deliver_frame(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Encode `text` as one frame and queue it.
    pub fn deliver_text(&self, text: &str) -> Result<(), DeliveryError> {
        let frame = ember_protocol::encode(text.as_bytes())?;
        self.deliver_frame(frame)
    }

    /// Whether the writer task has gone away.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Thread-safe registry of connected peers.
///
/// One reader/writer lock for the whole map. Lookups and snapshots share it;
/// register and unregister take it exclusively.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<RwLock<HashMap<PeerId, PeerHandle>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a peer. An identity collision replaces the old entry; with
    /// 128 random bits this is not expected to happen.
    pub async fn register(&self, handle: PeerHandle) {
        let peer_id = handle.peer_id;
        let remote = handle.remote;

        let (replaced, registry_size) = {
            let mut registry = self.inner.write().await;
            let replaced = registry.insert(peer_id, handle).is_some();
            (replaced, registry.len())
        };

        if replaced {
            tracing::warn!(peer = %peer_id, "registry: identity collision, entry replaced");
        }
        tracing::info!(
            peer = %peer_id,
            remote = ?remote,
            registry_size,
            "registry: peer registered"
        );
    }

    /// Remove a peer. Absent identities are ignored, so racing error paths
    /// may both call this.
    pub async fn unregister(&self, peer_id: &PeerId) -> Option<PeerHandle> {
        let mut registry = self.inner.write().await;
        let removed = registry.remove(peer_id);
        if removed.is_some() {
            tracing::info!(
                peer = %peer_id,
                registry_size = registry.len(),
                "registry: peer unregistered"
            );
        }
        removed
    }

    pub async fn lookup(&self, peer_id: &PeerId) -> Option<PeerHandle> {
        self.inner.read().await.get(peer_id).cloned()
    }

    /// Snapshot of every entry. The lock is released before this returns,
    /// so callers can write to peers without holding it.
    pub async fn all(&self) -> Vec<PeerHandle> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn peer_ids(&self) -> Vec<PeerId> {
        self.inner.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
