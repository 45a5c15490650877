//! # Sketch & Guess Server Library
//!
//! This library provides the authoritative server for a multiplayer "draw and
//! guess" game. One player draws a secret word while everyone else races to
//! guess it in chat; faster guesses score more points.
//!
//! ## Core Responsibilities
//!
//! ### Admission and Lobby
//! Accepts TCP connections and admits them while no game is running and the
//! lobby has room. Admitted players are kept in join order, and their
//! positional index is the identifier every client uses for them.
//!
//! ### Turn Scheduling
//! Runs the game itself:
//! - Shuffled turn order with every player drawing once per pass
//! - A fixed-length round clock with remaining-time broadcasts
//! - Letter hints for guessers as the clock runs down
//! - Scoring for correct guesses and for the drawer
//!
//! ### Relaying
//! Strokes from the drawer and chat from everyone are fanned out to the
//! lobby. Stroke contents are opaque to the server.
//!
//! ## Architecture Design
//!
//! ### Single Consumer
//! Every session forwards what its client sends as a [`game::GameEvent`] over
//! one channel. A single task owns the [`game::Scheduler`] and applies those
//! events in order, together with its own periodic clock tick. No game state
//! is shared behind locks.
//!
//! ### Per-Connection Tasks
//! Each connection has a reader that enforces an inactivity deadline and a
//! writer that owns the write half of the socket, drains the player's
//! outbound queue and sends heartbeat probes.
//!
//! ## Module Organization
//!
//! ### Lobby Module (`lobby`)
//! Player roster with contiguous indices and per-turn flags.
//!
//! ### Game Module (`game`)
//! The scheduler state machine: start, turns, hints, guesses, finish.
//!
//! ### Session Module (`session`)
//! Read loop and writer for one connection.
//!
//! ### Network Module (`network`)
//! Listener, acceptor task and the main event loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//! use server::words::WordList;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8080", GameConfig::default(), WordList::builtin()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

pub mod config;
pub mod game;
pub mod lobby;
pub mod network;
pub mod session;
pub mod words;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("failed to read local address: {0}")]
    LocalAddr(std::io::Error),

    #[error("failed to read word list {path}: {source}")]
    WordList {
        path: String,
        source: std::io::Error,
    },

    #[error("word list contains no words")]
    EmptyWordList,

    #[error("word {0:?} needs more than one UTF-16 unit per character")]
    UnsupportedWord(String),
}
