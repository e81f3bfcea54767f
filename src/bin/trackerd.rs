//! Tracker daemon: serves `QUERY_STORAGE_FOR_UPLOAD`, `QUERY_STORAGE_FOR_FETCH`,
//! and `LIST_ONE_GROUP` against an in-memory group/storage-node registry.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use fastdfs_storage::codec;
use fastdfs_storage::config::TrackerConfig;
use fastdfs_storage::tracker::Service;
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fdfs_trackerd")]
#[command(about = "FastDFS-style tracker daemon")]
struct Args {
    /// Path to a tracker.conf-equivalent TOML file.
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
    let mut config = TrackerConfig::load(&args.config)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let service = Arc::new(Service::new(config.offline_after()));

    let sweep_service = service.clone();
    let sweep_interval = config.offline_after() / 3;
    tokio::spawn(async move { sweep_service.sweep_forever(sweep_interval.max(std::time::Duration::from_secs(1))).await });

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(bind_addr = %config.bind_addr, "starting tracker daemon");

    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        tracing::debug!(%peer, "accepted tracker connection");
        tokio::spawn(serve_connection(socket, service.clone()));
    }
}

async fn serve_connection(mut socket: TcpStream, service: Arc<Service>) {
    loop {
        let (header, body) = match codec::read_frame(&mut socket).await {
            Ok(v) => v,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    tracing::warn!(error = %e, "tracker connection read failed");
                }
                return;
            }
        };

        let (status, response_body) = service.dispatch(header.command, body);
        if let Err(e) = codec::write_frame(&mut socket, header.command, status, &response_body).await {
            tracing::warn!(error = %e, "tracker connection write failed");
            return;
        }
    }
}
