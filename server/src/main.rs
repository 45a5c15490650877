use clap::Parser;
use log::info;
use server::config::GameConfig;
use server::network::Server;
use server::words::WordList;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Connections beyond this many players are turned away
    #[arg(short, long, default_value = "8")]
    max_players: usize,

    /// Seconds each drawer gets per turn
    #[arg(long, default_value = "40")]
    round_secs: u64,

    /// Extra passes through the turn order after the first (plus one last turn)
    #[arg(short, long, default_value = "3")]
    rounds: u32,

    /// Word list file, one word per line
    #[arg(short, long)]
    words: Option<PathBuf>,

    /// Seed for turn order and word choice
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Tip: Set RUST_LOG=info to see connection and game logs");
    }

    let args = Args::parse();

    let words = match &args.words {
        Some(path) => WordList::from_file(path)?,
        None => WordList::builtin(),
    };

    let config = GameConfig {
        max_players: args.max_players,
        round_duration: Duration::from_secs(args.round_secs),
        rounds: args.rounds,
        seed: args.seed,
        ..GameConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, config, words).await?;
    info!(
        "Accepting up to {} players, {}s turns",
        config.max_players, args.round_secs
    );

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
