//! Per-connection lifecycle: handle, reader loop, writer loop.

pub mod handle;
pub mod reader;
pub mod writer;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use pulse_core::config::HeartbeatConfig;

use crate::metrics::ServerMetrics;

pub use handle::{ConnectionHandle, ConnectionId};
pub use writer::WriterSettings;

/// Everything the acceptor needs to start the loops of a new connection.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// Heartbeat and read settings.
    pub heartbeat: HeartbeatConfig,
    /// Server counters.
    pub metrics: Arc<ServerMetrics>,
    /// Tracks every spawned loop so shutdown can wait for them.
    pub tracker: TaskTracker,
    /// Server-wide shutdown token.
    pub shutdown: CancellationToken,
}

impl ConnectionContext {
    fn writer_settings(&self) -> WriterSettings {
        WriterSettings {
            interval: self.heartbeat.interval(),
            command: self.heartbeat.command.clone(),
        }
    }
}

/// Split an accepted stream and start its reader and writer loops.
///
/// The loops are detached from the caller; they run until the connection
/// fails or the server shuts down.
pub fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &ConnectionContext,
) -> Arc<ConnectionHandle> {
    ctx.metrics.record_connect();
    let handle = Arc::new(ConnectionHandle::new(peer, &ctx.shutdown, ctx.metrics.clone()));

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(conn_id = %handle.id, error = %e, "Failed to set TCP_NODELAY");
    }

    let (read_half, write_half) = stream.into_split();

    ctx.tracker.spawn(reader::run_reader(
        Arc::clone(&handle),
        read_half,
        ctx.heartbeat.read_chunk_size,
        ctx.metrics.clone(),
    ));

    ctx.tracker.spawn(writer::run_writer(
        Arc::clone(&handle),
        write_half,
        ctx.writer_settings(),
        ctx.shutdown.clone(),
        ctx.metrics.clone(),
    ));

    handle
}
