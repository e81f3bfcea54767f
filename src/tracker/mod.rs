//! Minimal tracker service: group/storage-node bookkeeping and the three
//! tracker-side commands a client needs to locate a storage node.
//!
//! Registration and heartbeats are not part of the wire protocol's command
//! set; a storage
//! node's heartbeat loop calls [`Service::heartbeat`] directly. In this
//! crate that means tracker and storage share a process (as in the test
//! harness); a multi-process deployment would carry heartbeats over
//! whatever transport it chooses and call the same method.

mod list_one_group;
mod query_storage;
pub mod registry;
mod wire;

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::codec::Command;
use registry::Registry;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no group with that name is registered")]
    UnknownGroup,
    #[error("group has no active storage node")]
    NoActiveStorage,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn status_code(err: &Error) -> u8 {
    match err {
        Error::UnknownGroup => 2,       // ENOENT
        Error::NoActiveStorage => 11,   // EAGAIN
        Error::InvalidRequest(_) => 22, // EINVAL
    }
}

/// Tracker-side state: the group/storage-node registry plus its offline
/// sweep interval.
pub struct Service {
    pub registry: Registry,
}

impl Service {
    pub fn new(offline_after: Duration) -> Self {
        Service { registry: Registry::new(offline_after) }
    }

    pub fn register(&self, group: &str, addr: std::net::SocketAddr) {
        self.registry.register(group, addr);
    }

    pub fn heartbeat(&self, group: &str, addr: std::net::SocketAddr) {
        self.registry.heartbeat(group, addr);
    }

    /// Runs the offline sweep forever at `interval`; spawn this as its own
    /// task alongside the tracker's reactor.
    pub async fn sweep_forever(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.registry.sweep();
            debug!("swept tracker registry for stale heartbeats");
        }
    }

    /// Dispatches one decoded tracker-side request, returning the status
    /// byte and response body (mirrors `storage::Service::dispatch`).
    pub fn dispatch(&self, command: Command, body: Vec<u8>) -> (u8, Vec<u8>) {
        let result = match command {
            Command::QueryStorageForUpload => query_storage::handle_for_upload(self, &body),
            Command::QueryStorageForFetch => query_storage::handle_for_fetch(self, &body),
            Command::ListOneGroup => list_one_group::handle(self, &body),
            _ => Err(Error::InvalidRequest("storage-side command sent to the tracker".into())),
        };
        match result {
            Ok(body) => (0, body),
            Err(err) => (status_code(&err), Vec::new()),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn service(offline_after: Duration) -> Service {
        Service::new(offline_after)
    }
}
