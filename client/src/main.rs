use clap::Parser;
use client::game::ClientGameState;
use client::input::{parse_line, Command};
use client::network::Client;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Name shown to other players
    #[arg(short = 'n', long)]
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let mut client = Client::connect(&args.server, &args.name).await?;
    println!("Connected. Type to chat, /start to begin a game, /quit to leave");

    let mut state = ClientGameState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    client.disconnect()?;
                    break;
                };

                match parse_line(&line) {
                    Command::Start => client.request_start()?,
                    Command::Quit => {
                        client.disconnect()?;
                        break;
                    }
                    Command::Say(text) if state.in_game => client.send_game_chat(&text)?,
                    Command::Say(text) => client.send_chat(&text)?,
                    Command::Empty => {}
                }
            },

            frame = client.next_frame() => {
                let Some(frame) = frame else {
                    println!("Disconnected from server");
                    break;
                };

                if let Some(notice) = state.apply(&frame) {
                    println!("{}", notice);
                }
            },
        }
    }

    Ok(())
}
