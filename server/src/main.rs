use clap::Parser;
use log::info;
use server::{GameServer, ServerConfig};
use shared::DEFAULT_PORT;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to; the port is always 1350
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Milliseconds per simulation tick
    #[arg(short, long, default_value = "40", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Course seed, random if not given
    #[arg(short, long)]
    seed: Option<u32>,

    /// Number of sheep on the course
    #[arg(long, default_value = "40")]
    sheep: usize,

    /// Maximum concurrent players
    #[arg(short, long, default_value = "64")]
    max_players: usize,

    /// Seconds of silence before a peer is dropped
    #[arg(long, default_value = "5")]
    peer_timeout_secs: u64,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: DEFAULT_PORT,
            tick: Duration::from_millis(args.tick_ms),
            seed: args.seed.unwrap_or_else(rand::random),
            sheep: args.sheep,
            max_players: args.max_players,
            peer_timeout: Duration::from_secs(args.peer_timeout_secs),
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ServerConfig::from(Args::parse());
    config.validate()?;

    info!("Starting server on {}", config.address());
    info!(
        "Tick: {:?}, max players: {}, peer timeout: {:?}",
        config.tick, config.max_players, config.peer_timeout
    );

    let mut server = GameServer::bind(config).await?;
    server.run().await?;

    Ok(())
}
