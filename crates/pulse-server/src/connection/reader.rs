//! Inbound half: log whatever the client sends.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info};

use pulse_core::error::ErrorKind;
use pulse_core::{AppError, AppResult};

use crate::metrics::ServerMetrics;

use super::handle::ConnectionHandle;

/// How a read loop ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The peer shut down its side (zero-byte read).
    PeerClosed,
    /// The connection was closed by the writer loop or server shutdown.
    ClosedLocally,
}

/// Run the reader loop until EOF, error or close, then close the connection.
///
/// Received chunks are decoded as UTF-8 and logged. Nothing is ever written
/// back in response.
pub async fn run_reader<R>(
    handle: Arc<ConnectionHandle>,
    mut reader: R,
    chunk_size: usize,
    metrics: Arc<ServerMetrics>,
) where
    R: AsyncRead + Unpin,
{
    let reason = match read_loop(&handle, &mut reader, chunk_size, &metrics).await {
        Ok(ReadEnd::PeerClosed) => {
            info!(conn_id = %handle.id, peer = %handle.peer, "Peer closed connection");
            "peer closed"
        }
        Ok(ReadEnd::ClosedLocally) => {
            debug!(conn_id = %handle.id, "Reader stopped, connection closed locally");
            "closed locally"
        }
        Err(e) => {
            error!(
                conn_id = %handle.id,
                peer = %handle.peer,
                error = %e,
                "Read lost connection"
            );
            metrics.record_transport_error();
            "read error"
        }
    };

    handle.close(reason);
}

async fn read_loop<R>(
    handle: &ConnectionHandle,
    reader: &mut R,
    chunk_size: usize,
    metrics: &ServerMetrics,
) -> AppResult<ReadEnd>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    // Bytes of a UTF-8 character cut off by the previous read (at most 3).
    let mut pending: Vec<u8> = Vec::with_capacity(chunk_size + 3);

    loop {
        let n = tokio::select! {
            result = reader.read(&mut buf) => result?,
            _ = handle.closed() => return Ok(ReadEnd::ClosedLocally),
        };

        if n == 0 {
            if !pending.is_empty() {
                return Err(AppError::new(
                    ErrorKind::Decode,
                    format!(
                        "Connection ended inside a UTF-8 character ({} byte(s) left)",
                        pending.len()
                    ),
                ));
            }
            return Ok(ReadEnd::PeerClosed);
        }

        pending.extend_from_slice(&buf[..n]);
        let valid = decodable_prefix(&pending)?;
        metrics.record_message(n);

        if valid > 0 {
            let text = std::str::from_utf8(&pending[..valid])?;
            info!(
                conn_id = %handle.id,
                peer = %handle.peer,
                bytes = n,
                payload = %text,
                "Message received"
            );
        }

        pending.drain(..valid);
    }
}

/// Length of the longest prefix of `bytes` that is complete UTF-8.
///
/// A character truncated at the end is left for the next read; any other
/// invalid sequence is a decode error.
fn decodable_prefix(bytes: &[u8]) -> AppResult<usize> {
    match std::str::from_utf8(bytes) {
        Ok(_) => Ok(bytes.len()),
        Err(e) if e.error_len().is_none() => Ok(e.valid_up_to()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio_util::sync::CancellationToken;

    fn setup() -> (CancellationToken, Arc<ServerMetrics>, Arc<ConnectionHandle>) {
        let shutdown = CancellationToken::new();
        let metrics = Arc::new(ServerMetrics::new());
        metrics.record_connect();
        let handle = Arc::new(ConnectionHandle::new(
            "127.0.0.1:40001".parse().unwrap(),
            &shutdown,
            metrics.clone(),
        ));
        (shutdown, metrics, handle)
    }

    #[tokio::test]
    async fn test_logs_messages_until_eof() {
        let (_shutdown, metrics, handle) = setup();
        let (mut client, server) = tokio::io::duplex(64);

        client.write_all(b"hello").await.unwrap();
        client.shutdown().await.unwrap();
        drop(client);

        run_reader(handle.clone(), server, 1024, metrics.clone()).await;

        assert!(!handle.is_open());
        let snap = metrics.snapshot();
        assert_eq!(snap.messages_received, 1);
        assert_eq!(snap.bytes_received, 5);
        assert_eq!(snap.transport_errors, 0);
        assert_eq!(snap.connections_active, 0);
    }

    #[tokio::test]
    async fn test_reads_in_chunks() {
        let (_shutdown, metrics, handle) = setup();
        let (mut client, server) = tokio::io::duplex(64);

        client.write_all(b"abcdefghij").await.unwrap();
        drop(client);

        run_reader(handle, server, 4, metrics.clone()).await;

        let snap = metrics.snapshot();
        assert_eq!(snap.bytes_received, 10);
        assert_eq!(snap.messages_received, 3);
    }

    #[tokio::test]
    async fn test_invalid_utf8_closes_connection() {
        let (_shutdown, metrics, handle) = setup();
        let (mut client, server) = tokio::io::duplex(64);

        client.write_all(&[0xff, 0xfe, 0xfd]).await.unwrap();

        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            run_reader(handle.clone(), server, 1024, metrics.clone()),
        )
        .await
        .expect("reader should stop on undecodable input");

        assert!(!handle.is_open());
        let snap = metrics.snapshot();
        assert_eq!(snap.messages_received, 0);
        assert_eq!(snap.transport_errors, 1);
        drop(client);
    }

    #[tokio::test]
    async fn test_character_split_across_reads_is_kept() {
        let (_shutdown, metrics, handle) = setup();
        let (mut client, server) = tokio::io::duplex(4096);

        // 'é' is two bytes; with a 1024-byte chunk the first read ends after its lead byte.
        let mut input = vec![b'a'; 1023];
        input.extend_from_slice("é tail".as_bytes());
        client.write_all(&input).await.unwrap();
        drop(client);

        run_reader(handle.clone(), server, 1024, metrics.clone()).await;

        let snap = metrics.snapshot();
        assert_eq!(snap.transport_errors, 0);
        assert_eq!(snap.messages_received, 2);
        assert_eq!(snap.bytes_received, input.len() as u64);
        assert_eq!(snap.connections_active, 0);
    }

    #[test]
    fn test_decodable_prefix() {
        assert_eq!(decodable_prefix(b"hello").unwrap(), 5);
        assert_eq!(decodable_prefix(&[b'a', 0xc3]).unwrap(), 1);
        assert_eq!(decodable_prefix(&[0xe2, 0x82]).unwrap(), 0);
        let err = decodable_prefix(&[b'a', 0xff, b'b']).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Decode);
    }

    #[tokio::test]
    async fn test_eof_inside_character_is_decode_error() {
        let (_shutdown, metrics, handle) = setup();
        let (mut client, server) = tokio::io::duplex(64);

        client.write_all(&[b'o', b'k', 0xc3]).await.unwrap();
        drop(client);

        run_reader(handle.clone(), server, 1024, metrics.clone()).await;

        assert!(!handle.is_open());
        let snap = metrics.snapshot();
        assert_eq!(snap.messages_received, 1);
        assert_eq!(snap.transport_errors, 1);
    }

    #[tokio::test]
    async fn test_close_from_other_loop_stops_pending_read() {
        let (_shutdown, metrics, handle) = setup();
        let (_client, server) = tokio::io::duplex(64);

        let reader = tokio::spawn(run_reader(handle.clone(), server, 1024, metrics.clone()));
        handle.close("write error");

        tokio::time::timeout(std::time::Duration::from_secs(1), reader)
            .await
            .expect("reader should stop after close")
            .unwrap();
        assert_eq!(metrics.snapshot().connections_active, 0);
    }
}
