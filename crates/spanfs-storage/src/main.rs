use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use spanfs_storage::{StorageConfig, StorageServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "spanfs-storage")]
#[command(about = "spanfs storage server", long_about = None)]
struct Args {
    /// Local directory to serve.
    root: PathBuf,

    /// Address of the naming server's registration interface.
    #[arg(long)]
    naming: SocketAddr,

    /// Port of the client-facing storage interface; 0 lets the system
    /// choose.
    #[arg(long, default_value_t = 0)]
    storage_port: u16,

    /// Port of the command interface; 0 lets the system choose.
    #[arg(long, default_value_t = 0)]
    command_port: u16,

    /// Externally routable address to advertise in registration.
    #[arg(long)]
    advertise: Option<IpAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = StorageConfig {
        root: args.root,
        storage_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.storage_port)),
        command_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.command_port)),
        advertise_ip: args.advertise,
    };

    let server = Arc::new(StorageServer::new(config));
    server.start(args.naming).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.stop().await;
    Ok(())
}
