//! Calls into the storage service for each request and forwards the result
//! to the write task.

use std::sync::Arc;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, Instrument};

use super::message_types::{Request, Response};
use crate::storage::Service;

pub struct DispatchTask {
    request_recv: Receiver<Request>,
    response_send: Sender<Response>,
    service: Arc<Service>,
    connection_id: u64,
}

impl DispatchTask {
    pub fn spawn(
        request_recv: Receiver<Request>,
        response_send: Sender<Response>,
        service: Arc<Service>,
        connection_id: u64,
    ) -> JoinHandle<()> {
        tokio::spawn(Self { request_recv, response_send, service, connection_id }.run())
    }

    async fn run(mut self) {
        let mut request_seq: u64 = 0;
        while let Some(request) = self.request_recv.recv().await {
            let span = tracing::info_span!(
                "dispatch",
                connection_id = self.connection_id,
                request_seq,
                command = ?request.command,
            );
            let (status, body) =
                self.service.dispatch(self.connection_id, request.command, request.body).instrument(span).await;
            debug!(connection_id = self.connection_id, request_seq, status, "request completed");

            let response = Response { command: request.command, status, body };
            if self.response_send.send(response).await.is_err() {
                return;
            }
            request_seq += 1;
        }
    }
}
