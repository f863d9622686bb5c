//! # pulse-server
//!
//! TCP heartbeat server. Provides:
//!
//! - An acceptor owning the listening socket
//! - Per-connection reader and writer loops sharing an idempotently closable handle
//! - The `{"cmd": "ACCOUNT"}` heartbeat message and its wire encoding
//! - Process-wide connection and message counters

pub mod acceptor;
pub mod connection;
pub mod message;
pub mod metrics;
pub mod server;

pub use acceptor::Acceptor;
pub use connection::handle::ConnectionHandle;
pub use message::heartbeat::HeartbeatMessage;
pub use metrics::ServerMetrics;
pub use server::PulseServer;
