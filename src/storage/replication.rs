//! Forwards primary writes to the other storage nodes in the same group.
//!
//! On a successful write, [`Service::dispatch`] calls [`ReplicationSet::forward`]
//! with the same command and body the client sent, after the local disk-done
//! callback fires and before the response goes back to the client. Each peer
//! gets its own queue and a single dedicated task draining it, so writes
//! reach a peer in the same order the primary committed them. An offline
//! peer's queue stands in for the persistent per-peer replay log; this
//! in-memory queue is not itself durable across a restart, and an item that
//! exhausts the client's retry budget is logged and dropped rather than
//! retried indefinitely.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::client::StorageClient;
use crate::codec::Command;
use crate::config::ClientConfig;

struct Peer {
    addr: SocketAddr,
    active: AtomicBool,
    tx: mpsc::UnboundedSender<(Command, Vec<u8>)>,
}

/// One forwarding queue per peer storage node in the group.
pub struct ReplicationSet {
    peers: Vec<Arc<Peer>>,
}

impl ReplicationSet {
    /// No configured peers: `forward` becomes a no-op.
    pub fn empty() -> Self {
        ReplicationSet { peers: Vec::new() }
    }

    /// Spawns one forwarding task per address in `peer_addrs`, each driving
    /// its own [`StorageClient`] against a shared `client_config`.
    pub fn new(peer_addrs: &[String], client_config: ClientConfig) -> Self {
        let peers = peer_addrs
            .iter()
            .filter_map(|raw| match raw.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(addr = %raw, error = %e, "skipping unparsable replication peer address");
                    None
                }
            })
            .map(|addr| spawn_peer(addr, client_config.clone()))
            .collect();
        ReplicationSet { peers }
    }

    /// Enqueues `command`/`body` for forwarding to every configured peer.
    /// Non-blocking: the network round trip runs on each peer's own task,
    /// so a slow or unreachable peer never stalls the primary's response.
    pub fn forward(&self, command: Command, body: &[u8]) {
        for peer in &self.peers {
            let _ = peer.tx.send((command, body.to_vec()));
        }
    }

    /// Whether the most recent forward to `addr` succeeded. `false` for an
    /// address not in this set.
    pub fn peer_is_active(&self, addr: SocketAddr) -> bool {
        self.peers.iter().find(|p| p.addr == addr).is_some_and(|p| p.active.load(Ordering::Relaxed))
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

fn spawn_peer(addr: SocketAddr, client_config: ClientConfig) -> Arc<Peer> {
    let (tx, mut rx) = mpsc::unbounded_channel::<(Command, Vec<u8>)>();
    let peer = Arc::new(Peer { addr, active: AtomicBool::new(true), tx });
    let worker_peer = peer.clone();
    tokio::spawn(async move {
        let client = StorageClient::new(client_config);
        while let Some((command, body)) = rx.recv().await {
            match client.call(worker_peer.addr, command, body).await {
                Ok(_) => worker_peer.active.store(true, Ordering::Relaxed),
                Err(e) => {
                    worker_peer.active.store(false, Ordering::Relaxed);
                    tracing::warn!(addr = %worker_peer.addr, error = %e, "replication forward failed");
                }
            }
        }
    });
    peer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn config(addr: SocketAddr) -> ClientConfig {
        ClientConfig {
            tracker_addresses: vec![addr.to_string()],
            max_connections: 4,
            connect_timeout_ms: 200,
            network_timeout_ms: 200,
            idle_timeout_ms: 60_000,
            retry_count: 0,
            retry_base_ms: 5,
        }
    }

    async fn spawn_recorder() -> (SocketAddr, tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            loop {
                let (header, body) = match codec::read_frame(&mut socket).await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                let _ = tx.send(body.clone());
                if codec::write_frame(&mut socket, header.command, 0, &body).await.is_err() {
                    return;
                }
            }
        });
        (addr, rx)
    }

    #[tokio::test]
    async fn forwards_writes_to_every_peer() {
        let (addr, mut rx) = spawn_recorder().await;
        let set = ReplicationSet::new(&[addr.to_string()], config(addr));

        set.forward(Command::Upload, b"one");
        set.forward(Command::Upload, b"two");

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first, b"one");
        assert_eq!(second, b"two");
    }

    #[tokio::test]
    async fn marks_peer_inactive_when_unreachable() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let set = ReplicationSet::new(&[addr.to_string()], config(addr));
        set.forward(Command::Upload, b"data");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!set.peer_is_active(addr));
    }

    #[test]
    fn empty_set_forward_is_a_no_op() {
        let set = ReplicationSet::empty();
        set.forward(Command::Upload, b"data");
        assert_eq!(set.peer_count(), 0);
    }
}
