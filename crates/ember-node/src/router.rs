//! Message router -- turns one decoded payload into deliveries.
//!
//! Stateless across messages. A payload is either dropped (empty), rejected
//! with a notice back to the sender, delivered privately to one peer, or
//! broadcast to every registered peer (sender included).

use std::fmt;

use ember_protocol::messages::{self, Inbound, RoutingError};
use ember_protocol::PeerId;

use crate::peer_registry::{PeerHandle, PeerRegistry};

/// Who a message comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Peer(PeerId),
    /// The admin console. Has no registry entry.
    Server,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Peer(id) => write!(f, "{id}"),
            Origin::Server => f.write_str("server"),
        }
    }
}

/// What a router pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Empty payload, nothing sent.
    Dropped,
    Broadcast { delivered: usize, failed: usize },
    Private { destination: PeerId },
    /// Destination not registered; dropped without a notice.
    UnknownDestination(PeerId),
    /// Destination found but its queue refused the frame.
    DeliveryFailed(PeerId),
    /// Notice sent back to the sender instead of routing.
    Rejected(RoutingError),
    /// Formatted text does not fit in one frame.
    Oversized { size: usize },
}

#[derive(Clone)]
pub struct Router {
    registry: PeerRegistry,
}

impl Router {
    pub fn new(registry: PeerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Route one frame payload received from `sender`.
    pub async fn route(&self, sender: PeerId, payload: &[u8]) -> RouteOutcome {
        match Inbound::parse(payload) {
            Inbound::Empty => RouteOutcome::Dropped,
            Inbound::Malformed(err) => self.reject(sender, err).await,
            Inbound::Directed { destination, .. } if destination == sender => {
                self.reject(sender, RoutingError::SelfAddressed).await
            }
            Inbound::Directed { destination, text } => {
                tracing::info!(
                    src = %sender,
                    dst = %destination,
                    "router: private message"
                );
                self.send_private(Origin::Peer(sender), destination, &text)
                    .await
            }
            Inbound::Broadcast(text) => self.broadcast(&messages::broadcast(&text)).await,
        }
    }

    /// Deliver `text` to every registered peer. One failed peer does not
    /// stop delivery to the others.
    pub async fn broadcast(&self, text: &str) -> RouteOutcome {
        let frame = match ember_protocol::encode(text.as_bytes()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("router: broadcast dropped: {e}");
                return RouteOutcome::Oversized { size: text.len() };
            }
        };

        // Snapshot first; no registry lock is held while queueing
        let peers = self.registry.all().await;
        let mut delivered = 0;
        let mut failed = 0;
        for peer in &peers {
            match peer.deliver_frame(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(peer = %peer.peer_id, "router: broadcast delivery failed: {e}");
                }
            }
        }

        tracing::debug!(delivered, failed, "router: broadcast");
        RouteOutcome::Broadcast { delivered, failed }
    }

    /// Deliver a private message to `destination`. Unknown destinations are
    /// logged and dropped; the sender is not told.
    pub async fn send_private(&self, from: Origin, destination: PeerId, text: &str) -> RouteOutcome {
        let Some(peer) = self.registry.lookup(&destination).await else {
            tracing::warn!(src = %from, dst = %destination, "router: destination not found");
            return RouteOutcome::UnknownDestination(destination);
        };

        let notice = messages::private(from, text);
        let frame = match ember_protocol::encode(notice.as_bytes()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(src = %from, dst = %destination, "router: private message dropped: {e}");
                return RouteOutcome::Oversized { size: notice.len() };
            }
        };
        match peer.deliver_frame(frame) {
            Ok(()) => RouteOutcome::Private { destination },
            Err(e) => {
                tracing::warn!(src = %from, dst = %destination, "router: private delivery failed: {e}");
                RouteOutcome::DeliveryFailed(destination)
            }
        }
    }

    async fn reject(&self, sender: PeerId, err: RoutingError) -> RouteOutcome {
        tracing::debug!(peer = %sender, "router: rejected: {err}");
        match self.registry.lookup(&sender).await {
            Some(peer) => notify(&peer, &err.to_string()),
            None => tracing::debug!(peer = %sender, "router: sender gone, notice dropped"),
        }
        RouteOutcome::Rejected(err)
    }
}

fn notify(peer: &PeerHandle, text: &str) {
    if let Err(e) = peer.deliver_text(text) {
        tracing::warn!(peer = %peer.peer_id, "router: notice delivery failed: {e}");
    }
}
