//! The fixed heartbeat message pushed to every connected client.

use serde::Serialize;

use pulse_core::AppResult;

use super::serializer;

/// Command carried by the default heartbeat.
pub const ACCOUNT_COMMAND: &str = "ACCOUNT";

/// Heartbeat record, serialized as `{"cmd": "<command>"}`.
///
/// Stateless: the writer loop builds a fresh one for every send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeartbeatMessage {
    /// Command name.
    pub cmd: String,
}

impl HeartbeatMessage {
    /// Create a heartbeat with the given command.
    pub fn new(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }

    /// The `{"cmd": "ACCOUNT"}` heartbeat.
    pub fn account() -> Self {
        Self::new(ACCOUNT_COMMAND)
    }

    /// Encode to the bytes written on the socket. No delimiter, no length prefix.
    pub fn encode(&self) -> AppResult<Vec<u8>> {
        serializer::to_wire(self)
    }
}

impl Default for HeartbeatMessage {
    fn default() -> Self {
        Self::account()
    }
}
