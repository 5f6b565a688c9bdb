//! Ember Protocol -- frame codec, peer identity, in-band text messages.
//!
//! TCP between client and relay. Every logical message is one frame:
//! 2-byte little-endian length prefix + opaque payload bytes.

pub mod codec;
pub mod identity;
pub mod messages;

pub use codec::{decode, encode, FrameCodec, Frames};
pub use identity::PeerId;
pub use messages::{Inbound, RoutingError};

/// Length prefix size in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame corruption: {length} payload bytes at offset {offset}, buffer holds {available}")]
    FrameCorruption {
        offset: usize,
        length: usize,
        available: usize,
    },
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
