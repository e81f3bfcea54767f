//! Serializes [`Response`]s back to the peer.

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tracing::warn;

use super::message_types::Response;
use crate::codec;

pub struct WriteTask {
    writehalf: OwnedWriteHalf,
    response_recv: Receiver<Response>,
    connection_id: u64,
}

impl WriteTask {
    pub fn spawn(writehalf: OwnedWriteHalf, response_recv: Receiver<Response>, connection_id: u64) -> JoinHandle<()> {
        tokio::spawn(Self { writehalf, response_recv, connection_id }.run())
    }

    async fn run(mut self) {
        while let Some(response) = self.response_recv.recv().await {
            if let Err(e) =
                codec::write_frame(&mut self.writehalf, response.command, response.status, &response.body).await
            {
                warn!(connection_id = self.connection_id, error = %e, "failed to write response, closing connection");
                return;
            }
        }
    }
}
