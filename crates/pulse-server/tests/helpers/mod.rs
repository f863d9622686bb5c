//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use pulse_core::config::AppConfig;
use pulse_server::{PulseServer, ServerMetrics};

/// Exact bytes of one heartbeat on the wire.
pub const HEARTBEAT: &[u8] = br#"{"cmd": "ACCOUNT"}"#;

/// A server bound to an ephemeral loopback port, running in the background.
pub struct TestServer {
    /// Address clients connect to
    pub addr: SocketAddr,
    /// The running server
    pub server: PulseServer,
    /// Heartbeat interval used by the server
    pub interval: Duration,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with the given heartbeat interval.
    pub async fn start(interval_ms: u64) -> Self {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;
        config.server.shutdown_grace_seconds = 2;
        config.heartbeat.interval_ms = interval_ms;

        let server = PulseServer::new(config);
        let acceptor = server.bind().await.expect("Failed to bind test server");
        let addr = acceptor.local_addr().expect("Failed to read local address");

        let serving = server.clone();
        let task = tokio::spawn(async move {
            serving.serve(acceptor).await;
        });

        Self {
            addr,
            server,
            interval: Duration::from_millis(interval_ms),
            task,
        }
    }

    /// Open a client connection.
    pub async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr)
            .await
            .expect("Failed to connect to test server")
    }

    /// Server counters.
    pub fn metrics(&self) -> std::sync::Arc<ServerMetrics> {
        self.server.metrics()
    }

    /// Shut the server down and wait for it to finish.
    pub async fn stop(self) {
        self.server.shutdown();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("Server did not stop in time")
            .expect("Server task panicked");
    }
}

/// Read exactly one heartbeat, failing after `timeout`.
pub async fn read_heartbeat(stream: &mut TcpStream, timeout: Duration) -> Vec<u8> {
    let mut buf = vec![0u8; HEARTBEAT.len()];
    tokio::time::timeout(timeout, stream.read_exact(&mut buf))
        .await
        .expect("Timed out waiting for heartbeat")
        .expect("Failed to read heartbeat");
    buf
}

/// Read until the server closes its side, failing after `timeout`.
pub async fn read_until_eof(stream: &mut TcpStream, timeout: Duration) -> Vec<u8> {
    let mut buf = Vec::new();
    tokio::time::timeout(timeout, stream.read_to_end(&mut buf))
        .await
        .expect("Timed out waiting for server to close the connection")
        .expect("Failed to read until EOF");
    buf
}

/// True when `bytes` is zero or more whole heartbeats back to back.
pub fn only_heartbeats(bytes: &[u8]) -> bool {
    bytes.len() % HEARTBEAT.len() == 0 && bytes.chunks(HEARTBEAT.len()).all(|c| c == HEARTBEAT)
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
