//! In-band text sub-protocol carried inside frame payloads.
//!
//! Client → relay:
//!   `<text>`                 broadcast to every peer
//!   `/<peer-id> <text>`      private message to one peer
//!
//! Relay → client: plain text notices, built by the functions below.

use std::borrow::Cow;
use std::fmt::Display;

use crate::PeerId;

/// Marker byte that turns a payload into a directed message.
pub const DIRECTED_MARKER: u8 = b'/';

/// Why a directed message was refused. `Display` is the notice text sent
/// back to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    #[error("Invalid destination message")]
    InvalidDestinationMessage,
    #[error("Invalid destination ID")]
    InvalidDestinationId,
    #[error("Cannot send message to yourself")]
    SelfAddressed,
}

/// A decoded frame payload, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// Nothing to do.
    Empty,
    Broadcast(Cow<'a, str>),
    Directed {
        destination: PeerId,
        text: Cow<'a, str>,
    },
    /// Directed-message syntax that could not be parsed.
    Malformed(RoutingError),
}

impl<'a> Inbound<'a> {
    /// Interpret a frame payload. Does not know the sender, so self-addressed
    /// messages come back as ordinary `Directed` values.
    pub fn parse(payload: &'a [u8]) -> Self {
        let Some((&first, rest)) = payload.split_first() else {
            return Inbound::Empty;
        };

        if first != DIRECTED_MARKER {
            return Inbound::Broadcast(String::from_utf8_lossy(payload));
        }

        // Tolerate "/ <id> text" as well as "/<id> text"
        let start = rest.iter().position(|b| *b != b' ').unwrap_or(rest.len());
        let rest = &rest[start..];

        let Some(space) = rest.iter().position(|b| *b == b' ') else {
            return Inbound::Malformed(RoutingError::InvalidDestinationMessage);
        };

        let destination = std::str::from_utf8(&rest[..space])
            .ok()
            .and_then(|s| s.parse::<PeerId>().ok());
        let Some(destination) = destination else {
            return Inbound::Malformed(RoutingError::InvalidDestinationId);
        };

        Inbound::Directed {
            destination,
            text: String::from_utf8_lossy(&rest[space + 1..]),
        }
    }
}

pub fn welcome(server_name: &str, peer: PeerId) -> String {
    format!("Welcome to {server_name}, your ID is {peer}")
}

pub fn private(from: impl Display, text: &str) -> String {
    format!("[Private from {from}] {text}")
}

pub fn broadcast(text: &str) -> String {
    format!("[broadcast] {text}")
}

/// Broadcast typed at the relay's admin console.
pub fn server_broadcast(text: &str) -> String {
    format!("[SERVER BROADCAST] {text}")
}
