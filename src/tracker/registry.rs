//! In-memory registry of groups and the storage nodes within them.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Whether a storage node is still sending heartbeats.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeState {
    Active,
    Offline,
}

struct StorageNode {
    last_heartbeat: Instant,
    state: NodeState,
}

/// Groups and their member storage nodes, with heartbeat-driven liveness.
pub struct Registry {
    groups: DashMap<String, DashMap<SocketAddr, StorageNode>>,
    offline_after: Duration,
}

impl Registry {
    pub fn new(offline_after: Duration) -> Self {
        Registry { groups: DashMap::new(), offline_after }
    }

    /// Registers `addr` as a member of `group`, marking it active.
    pub fn register(&self, group: &str, addr: SocketAddr) {
        self.groups
            .entry(group.to_owned())
            .or_default()
            .insert(addr, StorageNode { last_heartbeat: Instant::now(), state: NodeState::Active });
    }

    /// Refreshes `addr`'s heartbeat timestamp, reactivating it if it had
    /// been marked offline.
    pub fn heartbeat(&self, group: &str, addr: SocketAddr) {
        if let Some(nodes) = self.groups.get(group) {
            if let Some(mut node) = nodes.get_mut(&addr) {
                node.last_heartbeat = Instant::now();
                node.state = NodeState::Active;
                return;
            }
        }
        self.register(group, addr);
    }

    /// Marks any node whose last heartbeat is older than `offline_after` as
    /// offline. Intended to run on a periodic timer alongside the tracker's
    /// reactor.
    pub fn sweep(&self) {
        let now = Instant::now();
        for group in self.groups.iter() {
            for mut entry in group.iter_mut() {
                if now.duration_since(entry.last_heartbeat) > self.offline_after {
                    entry.state = NodeState::Offline;
                }
            }
        }
    }

    /// One arbitrary active storage node in `group`, if any exist.
    pub fn pick_active(&self, group: &str) -> Option<SocketAddr> {
        let nodes = self.groups.get(group)?;
        nodes.iter().find(|entry| entry.state == NodeState::Active).map(|entry| *entry.key())
    }

    /// One arbitrary active storage node in any known group, returning the
    /// group name alongside it. Used when an upload request names no group.
    pub fn pick_any_active(&self) -> Option<(String, SocketAddr)> {
        for group in self.groups.iter() {
            if let Some(entry) = group.iter().find(|entry| entry.state == NodeState::Active) {
                return Some((group.key().clone(), *entry.key()));
            }
        }
        None
    }

    pub fn group_exists(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// All known storage nodes in `group`, with their liveness state.
    pub fn list_group(&self, group: &str) -> Vec<(SocketAddr, NodeState)> {
        match self.groups.get(group) {
            Some(nodes) => nodes.iter().map(|entry| (*entry.key(), entry.state)).collect(),
            None => Vec::new(),
        }
    }
}
