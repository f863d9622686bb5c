//! Shared handle for one accepted TCP connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pulse_core::{AppError, AppResult};

use crate::metrics::ServerMetrics;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// State shared by the reader and writer loops of one connection.
///
/// Each loop owns its half of the socket; the handle only tracks whether the
/// connection is still open. Either loop may call [`close`](Self::close), and
/// only the first call has any effect.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Remote address
    pub peer: SocketAddr,
    /// When the connection was accepted
    pub connected_at: DateTime<Utc>,
    /// Cleared exactly once, by the first `close`
    open: AtomicBool,
    /// Cancelled on close; pending reads and writes observe it
    closed: CancellationToken,
    /// Server counters
    metrics: Arc<ServerMetrics>,
}

impl ConnectionHandle {
    /// Create a handle for a freshly accepted connection.
    ///
    /// The close token is a child of `shutdown`, so stopping the server
    /// fails pending operations on every connection.
    pub fn new(peer: SocketAddr, shutdown: &CancellationToken, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            connected_at: Utc::now(),
            open: AtomicBool::new(true),
            closed: shutdown.child_token(),
            metrics,
        }
    }

    /// Check if the connection is still open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Fail with `ConnectionClosed` if the connection has been closed
    pub fn ensure_open(&self) -> AppResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AppError::connection_closed(format!(
                "connection {} to {} is closed",
                self.id, self.peer
            )))
        }
    }

    /// Close the connection.
    ///
    /// Returns `true` for the call that performed the transition and `false`
    /// for every later call.
    pub fn close(&self, reason: &str) -> bool {
        if !self.open.swap(false, Ordering::AcqRel) {
            tracing::trace!(conn_id = %self.id, reason, "Connection already closed");
            return false;
        }

        self.closed.cancel();
        self.metrics.record_disconnect();

        let open_for = Utc::now() - self.connected_at;
        tracing::info!(
            conn_id = %self.id,
            peer = %self.peer,
            reason,
            open_ms = open_for.num_milliseconds(),
            "Connection closed"
        );
        true
    }

    /// Resolves once the connection is closed or the server shuts down.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}
