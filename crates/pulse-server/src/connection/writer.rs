//! Outbound half: push a heartbeat every interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use pulse_core::error::ErrorKind;
use pulse_core::{AppError, AppResult};

use crate::message::HeartbeatMessage;
use crate::metrics::ServerMetrics;

use super::handle::ConnectionHandle;

/// Parameters of the heartbeat writer.
#[derive(Debug, Clone)]
pub struct WriterSettings {
    /// Pause between two heartbeats.
    pub interval: Duration,
    /// Value of the `cmd` field.
    pub command: String,
}

/// Run the writer loop until a send fails or the server shuts down, then
/// close the connection and shut down the write half.
///
/// A close made by the reader loop is only noticed at the next send, up to
/// one interval later.
pub async fn run_writer<W>(
    handle: Arc<ConnectionHandle>,
    mut writer: W,
    settings: WriterSettings,
    shutdown: CancellationToken,
    metrics: Arc<ServerMetrics>,
) where
    W: AsyncWrite + Unpin,
{
    let reason = match write_loop(&handle, &mut writer, &settings, &shutdown, &metrics).await {
        Ok(()) => {
            debug!(conn_id = %handle.id, "Writer stopped for server shutdown");
            "server shutdown"
        }
        Err(e) if e.kind == ErrorKind::ConnectionClosed => {
            debug!(conn_id = %handle.id, "Writer found connection closed");
            "closed locally"
        }
        Err(e) => {
            error!(
                conn_id = %handle.id,
                peer = %handle.peer,
                error = %e,
                "Write lost connection"
            );
            metrics.record_transport_error();
            "write error"
        }
    };

    handle.close(reason);

    if let Err(e) = writer.shutdown().await {
        trace!(conn_id = %handle.id, error = %e, "Write half shutdown failed");
    }
}

async fn write_loop<W>(
    handle: &ConnectionHandle,
    writer: &mut W,
    settings: &WriterSettings,
    shutdown: &CancellationToken,
    metrics: &ServerMetrics,
) -> AppResult<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        handle.ensure_open()?;

        let payload = HeartbeatMessage::new(settings.command.as_str()).encode()?;

        tokio::select! {
            result = writer.write_all(&payload) => result?,
            _ = handle.closed() => {
                return Err(AppError::connection_closed("connection closed during send"));
            }
        }
        metrics.record_heartbeat();
        trace!(conn_id = %handle.id, bytes = payload.len(), "Heartbeat sent");

        tokio::select! {
            _ = tokio::time::sleep(settings.interval) => {}
            _ = shutdown.cancelled() => return Ok(()),
        }
    }
}
