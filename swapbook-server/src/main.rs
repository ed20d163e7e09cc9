//! swapbook node
//!
//! Runs one order book node and its local HTTP API.

mod api;
mod config;
mod devnet;
mod repo;
mod server;
mod shutdown;
mod state;

use clap::{Args, Parser, Subcommand};
use config::{CliOverrides, ConfigLoader};
use repo::{Repo, default_data_dir};
use server::{build_router, run_server};
use state::AppState;
use std::path::PathBuf;
use swapbook_core::net::MemorySwarm;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Peer-to-peer order book for atomic swaps
#[derive(Parser, Debug)]
#[command(name = "swapbook")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the node and its HTTP API
    Start(StartArgs),
}

#[derive(Args, Debug)]
struct StartArgs {
    /// Peer-to-peer listen port
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// HTTP API listen port
    #[arg(long = "api-port", default_value_t = 0)]
    api_port: u16,

    /// Data directory holding the identity key and config file
    #[arg(long, env = "SWAPBOOK_DATADIR")]
    datadir: Option<PathBuf>,

    /// Path to the configuration file (defaults to <datadir>/swapbook.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of in-process peers to run alongside this node
    #[arg(long = "devnet-peers", default_value_t = 0)]
    devnet_peers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Start(args) => start(args).await,
    }
}

async fn start(args: StartArgs) -> anyhow::Result<()> {
    tracing::info!("Starting swapbook v{}", env!("CARGO_PKG_VERSION"));

    let data_dir = match args.datadir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let repo = Repo::open(&data_dir)?;
    tracing::info!(path = %repo.path().display(), "Using data directory");

    let loader = ConfigLoader::new(
        repo.path(),
        CliOverrides {
            port: args.port,
            api_port: args.api_port,
            config_path: args.config,
        },
    );
    let loaded = loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let keypair = repo.load_or_create_key()?;

    // Transport: every node of this process shares one in-memory swarm.
    let swarm = MemorySwarm::new();
    let node = devnet::start_node(
        &swarm,
        keypair,
        Some(loaded.p2p_listen),
        loaded.node.clone(),
    )
    .await?;
    let peers = devnet::spawn_peers(&swarm, args.devnet_peers, &loaded.node).await?;

    let router = build_router(AppState::new(node.clone()));

    tracing::info!("Starting HTTP server on {}", loaded.api_listen);
    let result = run_server(router, loaded.api_listen).await;

    tracing::info!("Stopping node...");
    for peer in &peers {
        peer.shutdown().await;
    }
    node.shutdown().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,swapbook_core=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_arguments() {
        let cli = Cli::try_parse_from([
            "swapbook",
            "start",
            "--port",
            "4001",
            "--api-port",
            "5001",
            "--devnet-peers",
            "2",
        ])
        .unwrap();
        let Command::Start(args) = cli.command;
        assert_eq!(args.port, 4001);
        assert_eq!(args.api_port, 5001);
        assert_eq!(args.devnet_peers, 2);
        assert!(args.config.is_none());
    }
}
