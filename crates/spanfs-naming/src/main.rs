use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use spanfs_naming::{NamingConfig, NamingServer, REGISTRATION_PORT, SERVICE_PORT};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "spanfs-naming")]
#[command(about = "spanfs naming server", long_about = None)]
struct Args {
    /// Address to bind both interfaces on.
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Port of the client-facing service interface.
    #[arg(long, default_value_t = SERVICE_PORT)]
    service_port: u16,

    /// Port of the storage-server-facing registration interface.
    #[arg(long, default_value_t = REGISTRATION_PORT)]
    registration_port: u16,

    /// Shared reads of a single-replica file before a copy is minted.
    #[arg(long, default_value_t = spanfs_naming::DEFAULT_REPLICATE_AFTER)]
    replicate_after: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = NamingConfig {
        service_addr: SocketAddr::new(args.bind, args.service_port),
        registration_addr: SocketAddr::new(args.bind, args.registration_port),
        replicate_after: args.replicate_after,
    };

    let server = Arc::new(NamingServer::new(config));
    server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.stop().await;
    Ok(())
}
