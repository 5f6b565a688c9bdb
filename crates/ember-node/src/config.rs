//! Configuration types for the ember relay.
//! Parsed from ember.toml.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub shutdown: ShutdownSection,
    #[serde(default)]
    pub admin: AdminSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    /// Initial read buffer capacity per connection. Grows only as far as a
    /// pending frame needs.
    #[serde(default = "default_read_buffer")]
    pub read_buffer_bytes: usize,
    /// Frames queued per peer before deliveries to it start failing.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            read_buffer_bytes: default_read_buffer(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownSection {
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSection {
    #[serde(default = "default_true")]
    pub console: bool,
}

impl Default for AdminSection {
    fn default() -> Self {
        Self { console: true }
    }
}

// Default value functions
fn default_name() -> String {
    "FIRE PHOENIX testing server".into()
}
fn default_listen_addr() -> String {
    "0.0.0.0:1337".into()
}
fn default_read_buffer() -> usize {
    64 * 1024
}
fn default_outbound_queue() -> usize {
    256
}
fn default_drain_timeout() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

impl RelayConfig {
    /// Load config from file, or fall back to defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: RelayConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown.drain_timeout_secs)
    }
}
