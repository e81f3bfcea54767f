//! Typed configuration for the storage node, tracker, and client runtime.
//!
//! Mirrors the shape of FastDFS's `storage.conf` / `tracker.conf` /
//! `client.conf` but loaded as TOML via `serde` instead of the original's
//! ad hoc `key=value` format, with `clap` supplying a `--config` path and a
//! handful of CLI overrides on top.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Failure loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config file: {0}")]
    Toml(#[from] toml::de::Error),
}

type Result<T> = std::result::Result<T, ConfigError>;

fn default_reader_count() -> usize {
    4
}

fn default_writer_count() -> usize {
    4
}

fn default_separate_read_write() -> bool {
    false
}

fn default_trunk_file_size() -> u64 {
    64 * 1024 * 1024
}

fn default_alloc_unit() -> u32 {
    64
}

fn default_small_file_threshold() -> u64 {
    16 * 1024
}

fn default_max_upload_bytes() -> u64 {
    1024 * 1024 * 1024
}

fn default_bind_addr() -> String {
    "0.0.0.0:23000".to_owned()
}

fn default_group_name() -> String {
    "group1".to_owned()
}

fn default_heartbeat_secs() -> u64 {
    30
}

/// Storage-node configuration (one per server process).
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Local directories, each an independent store path with its own
    /// disk-I/O thread pool and trunk-file space.
    pub store_paths: Vec<PathBuf>,
    /// Blocking worker threads doing reads, per store path.
    #[serde(default = "default_reader_count")]
    pub reader_count: usize,
    /// Blocking worker threads doing writes, per store path.
    #[serde(default = "default_writer_count")]
    pub writer_count: usize,
    /// Whether reads and writes are steered to disjoint worker sub-pools
    /// or share one combined pool.
    #[serde(default = "default_separate_read_write")]
    pub separate_read_write: bool,
    /// Size of a newly created trunk file, in bytes.
    #[serde(default = "default_trunk_file_size")]
    pub trunk_file_size: u64,
    /// Allocation alignment for trunk slots, in bytes.
    #[serde(default = "default_alloc_unit")]
    pub alloc_unit: u32,
    /// Files at or below this size are packed into a trunk file rather
    /// than stored standalone.
    #[serde(default = "default_small_file_threshold")]
    pub small_file_threshold: u64,
    /// Upper bound on a single `UPLOAD` body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// The replication group this storage node belongs to.
    #[serde(default = "default_group_name")]
    pub group_name: String,
    /// Address this node's reactor listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Tracker addresses this node registers with and sends heartbeats to.
    #[serde(default)]
    pub tracker_addresses: Vec<String>,
    /// Interval between heartbeats sent to each tracker.
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    /// Addresses of the other storage nodes in this node's group; writes
    /// committed here are forwarded to each one.
    #[serde(default)]
    pub peer_addresses: Vec<String>,
}

impl StorageConfig {
    /// Loads configuration from a TOML file at `path`.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&text)?;
        Ok(cfg)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// Tracker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_tracker_bind_addr")]
    pub bind_addr: String,
    /// Seconds of heartbeat silence after which a storage node is marked
    /// Offline.
    #[serde(default = "default_offline_after_secs")]
    pub offline_after_secs: u64,
}

fn default_tracker_bind_addr() -> String {
    "0.0.0.0:22000".to_owned()
}

fn default_offline_after_secs() -> u64 {
    90
}

impl TrackerConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&text)?;
        Ok(cfg)
    }

    pub fn offline_after(&self) -> Duration {
        Duration::from_secs(self.offline_after_secs)
    }
}

fn default_max_connections() -> usize {
    10
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_network_timeout_ms() -> u64 {
    30_000
}

fn default_idle_timeout_ms() -> u64 {
    60_000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    100
}

/// Client-runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Tracker addresses; required.
    pub tracker_addresses: Vec<String>,
    /// Upper bound on open connections per remote address.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_network_timeout_ms")]
    pub network_timeout_ms: u64,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Number of retries on retryable errors.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Base delay for exponential backoff: `base * 2^(attempt-1)`.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl ClientConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&text)?;
        Ok(cfg)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_millis(self.network_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}
