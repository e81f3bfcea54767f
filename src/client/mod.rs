//! Client runtime: connection pooling, retry, and the request/response
//! round trip against a storage node.
//!
//! A client holds one [`pool::ConnectionPool`] per remote address and
//! drives every call through [`retry::with_retry`] so transient network
//! failures (`ConnectionFailed`/`ConnectTimeout`/`NetworkTimeout`) are
//! retried with exponential backoff before surfacing to the caller.

pub mod pool;
pub mod retry;

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::codec::{self, Command};
use crate::config::ClientConfig;
use crate::error::StatusCode;
use pool::ConnectionPool;

/// Client-side failure modes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not establish a connection to the remote address")]
    ConnectionFailed,
    #[error("connection attempt timed out")]
    ConnectTimeout,
    #[error("a read or write on an established connection timed out")]
    NetworkTimeout,
    #[error("peer sent a frame this client does not understand: {0}")]
    ProtocolMismatch(String),
    #[error("operation was cancelled before completion")]
    Cancelled,
    #[error("server returned status {0}")]
    Server(StatusCode),
}

/// A request/response round trip against a single storage node, with
/// connection reuse and retry.
pub struct StorageClient {
    pool: ConnectionPool,
    config: ClientConfig,
}

impl StorageClient {
    pub fn new(config: ClientConfig) -> Self {
        let pool = ConnectionPool::new(config.max_connections, config.idle_timeout());
        StorageClient { pool, config }
    }

    /// Sends `command`/`body` to `addr` and returns the response body,
    /// retrying retryable failures per §7's error-kind table.
    pub async fn call(&self, addr: SocketAddr, command: Command, body: Vec<u8>) -> Result<Vec<u8>, Error> {
        retry::with_retry(&self.config, || self.call_once(addr, command, &body)).await
    }

    async fn call_once(&self, addr: SocketAddr, command: Command, body: &[u8]) -> Result<Vec<u8>, Error> {
        let mut conn = self.acquire(addr).await?;

        let write = codec::write_frame(&mut conn, command, 0, body);
        match timeout(self.config.network_timeout(), write).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                self.pool.discard(addr);
                return Err(Error::ConnectionFailed);
            }
            Err(_) => {
                self.pool.discard(addr);
                return Err(Error::NetworkTimeout);
            }
        }

        let read = codec::read_frame(&mut conn);
        let (header, response_body) = match timeout(self.config.network_timeout(), read).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                self.pool.discard(addr);
                return Err(if e.kind() == std::io::ErrorKind::InvalidData {
                    Error::ProtocolMismatch(e.to_string())
                } else {
                    Error::ConnectionFailed
                });
            }
            Err(_) => {
                self.pool.discard(addr);
                return Err(Error::NetworkTimeout);
            }
        };

        if header.command != command {
            self.pool.discard(addr);
            return Err(Error::ProtocolMismatch(format!(
                "expected {command:?} response, got {:?}",
                header.command
            )));
        }

        self.pool.release(addr, conn);

        if header.status == 0 {
            Ok(response_body)
        } else {
            Err(Error::Server(header.status))
        }
    }

    /// Reuses an idle connection if one is queued; otherwise dials a new one
    /// as long as this address's live count (idle plus checked-out) is under
    /// `max_connections`. At the cap, waits for another call on the same
    /// address to release its connection rather than opening another socket,
    /// bounded by `connect_timeout` so a stuck pool surfaces as a timeout.
    async fn acquire(&self, addr: SocketAddr) -> Result<TcpStream, Error> {
        loop {
            if let Some(conn) = self.pool.try_take(addr) {
                return Ok(conn);
            }
            if self.pool.live_count(addr) < self.config.max_connections.max(1) {
                let connect = TcpStream::connect(addr);
                let stream = timeout(self.config.connect_timeout(), connect)
                    .await
                    .map_err(|_| Error::ConnectTimeout)?
                    .map_err(|_| Error::ConnectionFailed)?;
                stream.set_nodelay(true).map_err(|_| Error::ConnectionFailed)?;
                self.pool.mark_checked_out(addr);
                return Ok(stream);
            }
            if timeout(self.config.connect_timeout(), self.pool.wait_for_release(addr)).await.is_err() {
                return Err(Error::ConnectTimeout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn config(addr_str: &str) -> ClientConfig {
        ClientConfig {
            tracker_addresses: vec![addr_str.to_owned()],
            max_connections: 4,
            connect_timeout_ms: 500,
            network_timeout_ms: 500,
            idle_timeout_ms: 60_000,
            retry_count: 2,
            retry_base_ms: 5,
        }
    }

    /// Accepts one connection and echoes back a fixed-status response for
    /// every request it receives, until the peer closes the socket.
    async fn spawn_echo_server(status: u8) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            loop {
                let (header, body) = match codec::read_frame(&mut socket).await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                if codec::write_frame(&mut socket, header.command, status, &body).await.is_err() {
                    return;
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn call_round_trips_through_a_real_socket() {
        let addr = spawn_echo_server(0).await;
        let client = StorageClient::new(config(&addr.to_string()));
        let response = client.call(addr, Command::Download, b"ping".to_vec()).await.unwrap();
        assert_eq!(response, b"ping");
    }

    #[tokio::test]
    async fn call_surfaces_a_non_zero_server_status() {
        let addr = spawn_echo_server(2).await;
        let client = StorageClient::new(config(&addr.to_string()));
        let result = client.call(addr, Command::Download, b"ping".to_vec()).await;
        assert!(matches!(result, Err(Error::Server(2))));
    }

    #[tokio::test]
    async fn connection_is_reused_across_successive_calls() {
        let addr = spawn_echo_server(0).await;
        let client = StorageClient::new(config(&addr.to_string()));
        client.call(addr, Command::Download, b"one".to_vec()).await.unwrap();
        client.call(addr, Command::Download, b"two".to_vec()).await.unwrap();
        assert_eq!(client.pool.open_count(addr), 1);
    }

    #[tokio::test]
    async fn concurrent_calls_wait_instead_of_exceeding_max_connections() {
        let addr = spawn_echo_server(0).await;
        let mut cfg = config(&addr.to_string());
        cfg.max_connections = 1;
        let client = std::sync::Arc::new(StorageClient::new(cfg));

        let a = client.clone();
        let b = client.clone();
        let (ra, rb) = tokio::join!(
            a.call(addr, Command::Download, b"one".to_vec()),
            b.call(addr, Command::Download, b"two".to_vec()),
        );
        ra.unwrap();
        rb.unwrap();
        assert_eq!(client.pool.live_count(addr), 1);
    }
}
