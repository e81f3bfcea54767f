//! Reads frames from a connection and forwards them to the dispatch task
//!.

use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::message_types::Request;
use crate::codec;

/// Reads RPC commands from a network connection, decodes them, and
/// forwards them to a [`super::dispatch_task::DispatchTask`].
///
/// A framing error is unrecoverable for the connection — unlike a
/// malformed individual request, there is no way to resynchronize a
/// byte stream after a bad header — so the read loop simply ends, which
/// drops `request_send` and lets the dispatch/write tasks wind down.
pub struct ReadTask {
    readhalf: OwnedReadHalf,
    request_send: Sender<Request>,
    connection_id: u64,
}

impl ReadTask {
    pub fn spawn(readhalf: OwnedReadHalf, request_send: Sender<Request>, connection_id: u64) -> JoinHandle<()> {
        tokio::spawn(Self { readhalf, request_send, connection_id }.run())
    }

    async fn run(mut self) {
        loop {
            let header = match codec::read_header(&mut self.readhalf).await {
                Ok(header) => header,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!(connection_id = self.connection_id, "peer closed connection");
                    return;
                }
                Err(e) => {
                    warn!(connection_id = self.connection_id, error = %e, "frame header error, closing connection");
                    return;
                }
            };

            let body = match codec::read_body(&mut self.readhalf, &header).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(connection_id = self.connection_id, error = %e, "frame body error, closing connection");
                    return;
                }
            };

            let request = Request { command: header.command, body };
            if self.request_send.send(request).await.is_err() {
                return;
            }
        }
    }
}
