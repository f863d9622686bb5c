//! Outbound message types and their wire encoding.

pub mod heartbeat;
pub mod serializer;

pub use heartbeat::HeartbeatMessage;
