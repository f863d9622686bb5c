//! Listening socket and accept loop.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};
use tracing::{error, info};

use pulse_core::config::ServerConfig;
use pulse_core::{AppError, AppResult};

use crate::connection::{self, ConnectionContext};

/// Minimum wait after a failed `accept`.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Sole owner of the listening socket.
#[derive(Debug)]
pub struct Acceptor {
    /// Bound, listening socket
    listener: TcpListener,
    /// Pause after each accepted connection
    accept_pause: Duration,
}

impl Acceptor {
    /// Bind and listen on the configured address with the configured backlog.
    pub async fn bind(config: &ServerConfig) -> AppResult<Self> {
        let address = config.bind_address();
        let addr = tokio::net::lookup_host(address.as_str())
            .await
            .map_err(|e| AppError::bind(format!("Failed to resolve {address}: {e}")))?
            .next()
            .ok_or_else(|| AppError::bind(format!("No address found for {address}")))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| AppError::bind(format!("Failed to create socket: {e}")))?;

        socket
            .set_reuseaddr(true)
            .map_err(|e| AppError::bind(format!("Failed to set SO_REUSEADDR: {e}")))?;
        socket
            .bind(addr)
            .map_err(|e| AppError::bind(format!("Failed to bind {addr}: {e}")))?;
        let listener = socket
            .listen(config.backlog)
            .map_err(|e| AppError::bind(format!("Failed to listen on {addr}: {e}")))?;

        info!(
            "Listening on {} (backlog {})",
            listener.local_addr().unwrap_or(addr),
            config.backlog
        );

        Ok(Self {
            listener,
            accept_pause: Duration::from_millis(config.accept_pause_ms),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| AppError::internal(format!("Failed to read local address: {e}")))
    }

    /// Accept connections until the shutdown token in `ctx` is cancelled.
    ///
    /// Every accepted connection gets one reader and one writer loop; the
    /// loop goes straight back to `accept` without waiting on them. Accept
    /// errors are logged and retried after a short backoff.
    pub async fn run(self, ctx: ConnectionContext) {
        loop {
            let accepted = tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let handle = connection::spawn_connection(stream, peer, &ctx);
                            info!(conn_id = %handle.id, peer = %peer, "Connection established");
                            true
                        }
                        Err(e) => {
                            let e = AppError::accept(format!("Failed to accept connection: {e}"));
                            error!(error = %e, "Accept error");
                            false
                        }
                    }
                }
                _ = ctx.shutdown.cancelled() => {
                    info!("Acceptor shutting down");
                    break;
                }
            };

            let pause = self.pause_after(accepted);
            if !pause.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = ctx.shutdown.cancelled() => {
                        info!("Acceptor shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Pause before the next `accept`. Errors such as `EMFILE` tend to
    /// repeat, so a failed accept waits at least [`ACCEPT_ERROR_BACKOFF`].
    fn pause_after(&self, accepted: bool) -> Duration {
        if accepted {
            self.accept_pause
        } else {
            self.accept_pause.max(ACCEPT_ERROR_BACKOFF)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::error::ErrorKind;

    fn loopback() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let acceptor = Acceptor::bind(&loopback()).await.unwrap();
        let addr = acceptor.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_address_in_use_is_bind_error() {
        let first = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().unwrap();

        let config = ServerConfig {
            port: taken.port(),
            ..loopback()
        };
        let err = Acceptor::bind(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Bind);
    }

    #[tokio::test]
    async fn test_accept_error_waits_before_retrying() {
        let acceptor = Acceptor::bind(&loopback()).await.unwrap();
        assert_eq!(acceptor.pause_after(true), Duration::ZERO);
        assert_eq!(acceptor.pause_after(false), ACCEPT_ERROR_BACKOFF);

        let slow = Acceptor::bind(&ServerConfig {
            accept_pause_ms: 1000,
            ..loopback()
        })
        .await
        .unwrap();
        assert_eq!(slow.pause_after(true), Duration::from_secs(1));
        assert_eq!(slow.pause_after(false), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_bind_error() {
        let config = ServerConfig {
            host: "not a host name".to_string(),
            ..loopback()
        };
        let err = Acceptor::bind(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Bind);
    }
}
