//! Listening socket and accept loop configuration.

use serde::{Deserialize, Serialize};

/// TCP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port (`0` picks an ephemeral port).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen backlog passed to `listen(2)`.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Pause after each accepted connection in milliseconds (`0` = none).
    #[serde(default)]
    pub accept_pause_ms: u64,
    /// How long shutdown waits for connection tasks, in seconds.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

impl ServerConfig {
    /// The `host:port` string the listener binds to. IPv6 literals get
    /// brackets (`[::1]:8888`).
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            accept_pause_ms: 0,
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_backlog() -> u32 {
    10
}

fn default_shutdown_grace() -> u64 {
    5
}
