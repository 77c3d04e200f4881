//! decoy-server CLI entry point.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use decoy_server::{DispatchEngine, EngineOptions, MockConfig, MockServer};

#[derive(Parser, Debug)]
#[command(
    name = "decoy-server",
    about = "Local development server answering action requests from mock data sources",
    version
)]
struct Args {
    /// Address to bind
    #[arg(short, long, default_value = "127.0.0.1", env = "DECOY_ADDR")]
    addr: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "DECOY_PORT")]
    port: u16,

    /// Path to the mock configuration file
    #[arg(
        short,
        long,
        default_value = "config/mockConfig.json",
        env = "DECOY_CONFIG"
    )]
    config: PathBuf,

    /// Comma-separated request path suffixes treated as actions
    #[arg(long, default_value = ".action", env = "DECOY_ACTION_SUFFIX")]
    action_suffix: String,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = MockConfig::from_file(&args.config)?;
    if args.validate {
        println!(
            "Configuration is valid ({} data sources configured)",
            config.data_source.len()
        );
        return Ok(());
    }
    info!("Loaded mock configuration from {}", args.config.display());

    let options = EngineOptions::with_suffix_list(&args.action_suffix);
    let engine = DispatchEngine::new(config, options)?;
    let server = MockServer::new(engine, SocketAddr::new(args.addr, args.port));
    server.run().await
}
