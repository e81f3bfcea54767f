//! Network reactor: accepts connections and runs the read/dispatch/write
//! task split per connection.
//!
//! ```text
//! socket -> ReadTask -> (request channel) -> DispatchTask -> (response channel) -> WriteTask -> socket
//! ```
//!
//! Ownership of request/response state transfers between tasks over
//! `tokio::sync::mpsc` channels rather than being shared behind a lock.

mod dispatch_task;
mod message_types;
mod read_task;
mod write_task;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::storage::Service;
use dispatch_task::DispatchTask;
use read_task::ReadTask;
use write_task::WriteTask;

const REQUEST_CHANNEL_DEPTH: usize = 64;
const RESPONSE_CHANNEL_DEPTH: usize = 64;

/// Accepts connections forever, spawning the three-task pipeline for each.
pub async fn handle_forever(listener: TcpListener, service: Arc<Service>) -> std::io::Result<()> {
    let next_connection_id = Arc::new(AtomicU64::new(1));
    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;

        let connection_id = next_connection_id.fetch_add(1, Ordering::Relaxed);
        info!(connection_id, %peer, "accepted connection");
        process_socket(socket, service.clone(), connection_id);
    }
}

fn process_socket(socket: TcpStream, service: Arc<Service>, connection_id: u64) {
    let (readhalf, writehalf) = socket.into_split();

    let (request_send, request_recv) = tokio::sync::mpsc::channel(REQUEST_CHANNEL_DEPTH);
    let (response_send, response_recv) = tokio::sync::mpsc::channel(RESPONSE_CHANNEL_DEPTH);

    ReadTask::spawn(readhalf, request_send, connection_id);
    DispatchTask::spawn(request_recv, response_send, service, connection_id);
    WriteTask::spawn(writehalf, response_recv, connection_id);

    debug!(connection_id, "spawned connection task pipeline");
}
