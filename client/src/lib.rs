//! # Sketch & Guess Client Library
//!
//! A headless client for the Sketch & Guess server. It speaks the binary
//! protocol from the `shared` crate and keeps a local model of the lobby,
//! without any drawing surface of its own.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Connection handling:
//! - Admission handshake and name announcement
//! - Background reader that answers heartbeat probes
//! - Typed send helpers for chat, guesses, strokes and start requests
//!
//! ### Game Module (`game`)
//! [`game::ClientGameState`] applies server frames to a local roster, score
//! table, word, timer and canvas stroke list.
//!
//! ### Input Module (`input`)
//! Parses terminal lines into commands for the bundled binary.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGameState;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:8080", "alice").await?;
//!     let mut state = ClientGameState::new();
//!
//!     client.request_start()?;
//!     while let Some(frame) = client.next_frame().await {
//!         if let Some(line) = state.apply(&frame) {
//!             println!("{}", line);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
