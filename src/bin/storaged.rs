//! Storage-node daemon: binds the network reactor to a [`storage::Service`]
//! backed by the configured store paths.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fastdfs_storage::config::{ClientConfig, StorageConfig};
use fastdfs_storage::disk::StorePath;
use fastdfs_storage::storage::replication::ReplicationSet;
use fastdfs_storage::storage::Service;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fdfs_storaged")]
#[command(about = "FastDFS-style storage-node daemon")]
struct Args {
    /// Path to a storage.conf-equivalent TOML file.
    #[arg(short, long)]
    config: PathBuf,

    /// Overrides the bind address from the config file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut config = StorageConfig::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    if config.store_paths.is_empty() {
        return Err("storage config must list at least one store path".into());
    }

    let store_paths: Vec<Arc<StorePath>> = config
        .store_paths
        .iter()
        .enumerate()
        .map(|(index, root)| {
            Arc::new(StorePath::spawn(
                index as u8,
                root.clone(),
                config.reader_count,
                config.writer_count,
                config.trunk_file_size,
                config.alloc_unit,
                config.separate_read_write,
            ))
        })
        .collect();

    let listener = TcpListener::bind(&config.bind_addr).await?;
    let source_ip: IpAddr = listener.local_addr()?.ip();

    tracing::info!(
        bind_addr = %config.bind_addr,
        group = %config.group_name,
        store_paths = store_paths.len(),
        "starting storage daemon"
    );
    if !config.tracker_addresses.is_empty() {
        tracing::info!(
            trackers = ?config.tracker_addresses,
            "tracker registration/heartbeat transport is not wired in this build; \
             co-locate the tracker service in-process to exercise it"
        );
    }

    let mut service =
        Service::new(config.group_name, store_paths, config.small_file_threshold, config.max_upload_bytes, source_ip);

    if !config.peer_addresses.is_empty() {
        let replication_config = ClientConfig {
            tracker_addresses: Vec::new(),
            max_connections: 4,
            connect_timeout_ms: 5_000,
            network_timeout_ms: 30_000,
            idle_timeout_ms: 60_000,
            retry_count: 3,
            retry_base_ms: 100,
        };
        service = service.with_replication(ReplicationSet::new(&config.peer_addresses, replication_config));
    }

    fastdfs_storage::net::handle_forever(listener, Arc::new(service)).await?;
    Ok(())
}
