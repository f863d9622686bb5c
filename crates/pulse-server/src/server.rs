//! Top-level server that ties the acceptor, connection tasks and counters together.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use pulse_core::AppResult;
use pulse_core::config::AppConfig;

use crate::acceptor::Acceptor;
use crate::connection::ConnectionContext;
use crate::metrics::{MetricsSnapshot, ServerMetrics};

/// The heartbeat server.
///
/// Owns the shutdown token and the task tracker for every per-connection
/// loop. Connection tasks are not joined while the server runs; they are
/// only awaited during shutdown.
#[derive(Debug, Clone)]
pub struct PulseServer {
    /// Configuration.
    config: AppConfig,
    /// Server counters.
    metrics: Arc<ServerMetrics>,
    /// Per-connection loops.
    tracker: TaskTracker,
    /// Shutdown signal.
    shutdown: CancellationToken,
}

impl PulseServer {
    /// Create a server from configuration. Nothing is bound yet.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(ServerMetrics::new()),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Bind the listening socket.
    pub async fn bind(&self) -> AppResult<Acceptor> {
        Acceptor::bind(&self.config.server).await
    }

    /// Bind, then serve until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) -> AppResult<()> {
        let acceptor = self.bind().await?;
        self.serve(acceptor).await;
        Ok(())
    }

    /// Serve connections from an already bound acceptor until shutdown,
    /// then wait for connection tasks to finish.
    pub async fn serve(&self, acceptor: Acceptor) {
        info!(
            "Heartbeat every {} ms, command {:?}",
            self.config.heartbeat.interval_ms, self.config.heartbeat.command
        );

        let ctx = ConnectionContext {
            heartbeat: self.config.heartbeat.clone(),
            metrics: Arc::clone(&self.metrics),
            tracker: self.tracker.clone(),
            shutdown: self.shutdown.clone(),
        };

        acceptor.run(ctx).await;
        self.drain().await;
    }

    /// Signal the acceptor and every connection to stop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Server counters.
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    async fn drain(&self) {
        self.tracker.close();

        let grace = Duration::from_secs(self.config.server.shutdown_grace_seconds);
        info!(
            "Waiting up to {:?} for {} connection task(s)",
            grace,
            self.tracker.len()
        );

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(
                remaining = self.tracker.len(),
                "Connection tasks still running after grace period"
            );
        }

        let snapshot: MetricsSnapshot = self.metrics.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            messages_received = snapshot.messages_received,
            heartbeats_sent = snapshot.heartbeats_sent,
            transport_errors = snapshot.transport_errors,
            "Server stopped"
        );
    }
}
