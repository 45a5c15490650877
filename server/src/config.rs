//! Tunables for the game server and their defaults

use shared::{DEFAULT_ROUNDS, HEARTBEAT_INTERVAL_MS, INACTIVITY_TIMEOUT_SECS, ROUND_DURATION_SECS};
use std::time::Duration;

/// Tunables for one server instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameConfig {
    /// Connections beyond this count are turned away with a denial frame
    pub max_players: usize,
    /// How long each drawer has before the turn passes on
    pub round_duration: Duration,
    /// Extra passes through the turn order after the first one; one more
    /// turn is played from the refill that exhausts the counter
    pub rounds: u32,
    /// Period of the heartbeat probe written to every client
    pub heartbeat_interval: Duration,
    /// A session with no inbound frame for this long is dropped
    pub inactivity_timeout: Duration,
    /// Period of the scheduler's round clock
    pub tick_interval: Duration,
    /// Fixed RNG seed for reproducible shuffles and word picks
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            round_duration: Duration::from_secs(ROUND_DURATION_SECS),
            rounds: DEFAULT_ROUNDS,
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL_MS),
            inactivity_timeout: Duration::from_secs(INACTIVITY_TIMEOUT_SECS),
            tick_interval: Duration::from_millis(500),
            seed: None,
        }
    }
}
