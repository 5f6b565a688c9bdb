//! Ember Node -- library crate for the TCP chat relay.
//!
//! Re-exports all internal modules so integration tests and the binary can
//! reach the registry, router, sessions, listener and server types.

pub mod admin;
pub mod client;
pub mod config;
pub mod listener;
pub mod peer_registry;
pub mod router;
pub mod server;
pub mod session;

pub use config::RelayConfig;
pub use server::{Server, ShutdownHandle};
