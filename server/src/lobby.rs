//! Player roster for the lobby and the running game
//!
//! This module tracks every admitted connection, including:
//! - Join-order positional indices that clients use to address players
//! - Per-player turn flags (drawing, already answered, revealed hints)
//! - The outbound frame queue used to reach each player's socket
//!
//! Indices are always the contiguous range `0..len`. Removing a player shifts
//! everyone behind them down by one, mirroring what clients do to their own
//! roster when they receive a removal notice.

use log::{debug, info};
use shared::ServerFrame;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

/// Frames that may wait for one player's writer before the player is dropped
pub const OUTBOUND_CAPACITY: usize = 1024;

/// Stable identifier for one connection, never reused while the server runs
pub type PlayerId = u32;

/// Queue feeding a single player's socket writer
///
/// Every frame for a connection goes through this channel and is written by
/// one task, so two frames can never interleave on the wire. A full queue
/// means the client stopped reading; the frame is dropped and the overflow
/// signal fires so the session can disconnect the player.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<ServerFrame>,
    overflow: Arc<Notify>,
}

impl Outbound {
    /// Creates an outbound queue and the receiving end its writer drains
    pub fn channel() -> (Self, mpsc::Receiver<ServerFrame>) {
        Self::with_capacity(OUTBOUND_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(capacity);
        let overflow = Arc::new(Notify::new());
        (Self { tx, overflow }, rx)
    }

    /// Queues a frame, returning false if the writer is gone or backed up
    pub fn send(&self, frame: ServerFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.overflow.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Fires once the queue has overflowed
    pub fn overflow_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.overflow)
    }
}

/// A connected player and their state for the current turn
#[derive(Debug)]
pub struct Player {
    /// Connection identifier assigned on admission
    pub id: PlayerId,
    /// Position in the roster, shared with every client
    pub index: usize,
    /// Display name, unset until the client sends it
    pub name: Option<String>,
    /// Set once the player guessed this turn's word (always set for the drawer)
    pub already_answered: bool,
    /// Whether this player is the one drawing this turn
    pub currently_drawing: bool,
    /// Word positions this player has been shown as hints, per hint slot
    pub revealed_hints: [Option<usize>; 2],
    outbound: Outbound,
}

impl Player {
    pub fn new(id: PlayerId, index: usize, outbound: Outbound) -> Self {
        Self {
            id,
            index,
            name: None,
            already_answered: false,
            currently_drawing: false,
            revealed_hints: [None, None],
            outbound,
        }
    }

    /// Queues a frame for this player; a dead connection is not an error
    pub fn send(&self, frame: ServerFrame) -> bool {
        let delivered = self.outbound.send(frame);
        if !delivered {
            debug!("Dropping frame for player {}: queue closed or full", self.id);
        }
        delivered
    }

    /// Clears everything tied to a single turn
    pub fn reset_turn_flags(&mut self) {
        self.already_answered = false;
        self.currently_drawing = false;
        self.revealed_hints = [None, None];
    }

    pub fn wire_index(&self) -> i32 {
        self.index as i32
    }
}

/// Ordered registry of every admitted player
pub struct Lobby {
    /// Players in join order; position equals `Player::index`
    players: Vec<Player>,
    /// Next identifier handed out on admission
    next_player_id: PlayerId,
    /// Maximum number of players allowed at once
    max_players: usize,
}

impl Lobby {
    /// Creates an empty lobby; player IDs start from 1
    pub fn new(max_players: usize) -> Self {
        Self {
            players: Vec::new(),
            next_player_id: 1,
            max_players,
        }
    }

    /// Appends a player at the end of the roster
    ///
    /// Returns the new player's ID and positional index, or None if the
    /// lobby is already at capacity.
    pub fn add(&mut self, outbound: Outbound) -> Option<(PlayerId, usize)> {
        if self.is_full() {
            return None;
        }

        let id = self.next_player_id;
        self.next_player_id += 1;
        let index = self.players.len();

        self.players.push(Player::new(id, index, outbound));
        info!("Player {} admitted at index {}", id, index);

        Some((id, index))
    }

    /// Removes a player and closes the gap they leave behind
    ///
    /// Every player with a higher index moves down by one. Returns the
    /// removed player, or None if they were already gone.
    pub fn remove(&mut self, id: PlayerId) -> Option<Player> {
        let position = self.players.iter().position(|p| p.id == id)?;
        let removed = self.players.remove(position);

        for player in self.players.iter_mut().skip(position) {
            player.index -= 1;
            debug!("Player {} moved to index {}", player.id, player.index);
        }

        info!("Player {} removed from index {}", removed.id, removed.index);
        Some(removed)
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn by_index(&self, index: usize) -> Option<&Player> {
        self.players.get(index)
    }

    /// Queues a frame for one player, returning false if they are gone
    pub fn send_to(&self, id: PlayerId, frame: ServerFrame) -> bool {
        self.get(id).map(|p| p.send(frame)).unwrap_or(false)
    }

    /// Queues a frame for every player
    ///
    /// A closed connection only loses its own copy; delivery to the rest of
    /// the roster carries on.
    pub fn broadcast(&self, frame: &ServerFrame) {
        for player in &self.players {
            player.send(frame.clone());
        }
    }

    /// Queues a frame for every player except one
    pub fn broadcast_except(&self, exclude: PlayerId, frame: &ServerFrame) {
        for player in self.players.iter().filter(|p| p.id != exclude) {
            player.send(frame.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }
}
