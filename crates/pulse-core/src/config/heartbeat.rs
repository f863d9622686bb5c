//! Per-connection heartbeat and read loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Heartbeat writer and inbound reader settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Interval between heartbeats in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of bytes requested per receive call.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    /// Value of the `cmd` field in every heartbeat.
    #[serde(default = "default_command")]
    pub command: String,
}

impl HeartbeatConfig {
    /// Heartbeat interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            read_chunk_size: default_read_chunk_size(),
            command: default_command(),
        }
    }
}

fn default_interval_ms() -> u64 {
    3000
}

fn default_read_chunk_size() -> usize {
    1024
}

fn default_command() -> String {
    "ACCOUNT".to_string()
}
