//! Integration test entry point for ember-node.
//!
//! Run with: cargo test --test integration

mod chat;
mod framing;
mod shutdown;
