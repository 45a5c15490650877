//! Turn scheduler: the single owner of the lobby and the running game

use crate::config::GameConfig;
use crate::lobby::{Lobby, Outbound, Player, PlayerId};
use crate::words::WordList;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{ServerFrame, Stroke};
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Points awarded to the drawer for every distinct correct guess
pub const DRAWER_SCORE: i32 = 8;

/// Placeholder shown for letters a guesser has not been given
pub const HINT_PLACEHOLDER: char = '?';

/// First hint goes out once this many seconds remain
const FIRST_HINT_SECS: i64 = 20;
/// Second hint goes out once this many seconds remain, for longer words
const SECOND_HINT_SECS: i64 = 10;
const SECOND_HINT_MIN_LEN: usize = 6;

/// Events funneled from sessions into the scheduler task
#[derive(Debug)]
pub enum GameEvent {
    /// A new socket wants in; the reply carries its ID when admitted
    Connect {
        outbound: Outbound,
        reply: oneshot::Sender<Option<PlayerId>>,
    },
    Join {
        id: PlayerId,
        name: String,
    },
    Disconnect {
        id: PlayerId,
    },
    LobbyChat {
        id: PlayerId,
        text: String,
    },
    GameChat {
        id: PlayerId,
        text: String,
    },
    StartGame {
        id: PlayerId,
    },
    Stroke {
        id: PlayerId,
        stroke: Stroke,
    },
    StopDrawing {
        id: PlayerId,
    },
}

/// State that only exists while a game is running
#[derive(Debug)]
struct RoundState {
    word: String,
    /// Goes negative on the last refill; the game ends at the time-up after that
    rounds_remaining: i64,
    turn_order: Vec<PlayerId>,
    turn_queue: VecDeque<PlayerId>,
    drawer: Option<PlayerId>,
    round_start: Instant,
    hints: [Option<usize>; 2],
    correct_count: usize,
}

/// Points for a correct guess when `correct_so_far` players already got it
pub fn guesser_score(player_count: usize, correct_so_far: usize) -> i32 {
    (player_count as i32 - correct_so_far as i32) * 4 + 16
}

/// Hides every letter of `word` except the revealed positions
pub fn mask_word(word: &str, revealed: &[Option<usize>]) -> String {
    let letters: Vec<char> = word.chars().collect();
    let mut masked = vec![HINT_PLACEHOLDER; letters.len()];

    for &position in revealed.iter().flatten() {
        if let Some(&letter) = letters.get(position) {
            masked[position] = letter;
        }
    }

    masked.into_iter().collect()
}

/// Shuffles by swapping random pairs three times per entry
fn shuffle_turn_order<R: Rng>(order: &mut [PlayerId], rng: &mut R) {
    let len = order.len();
    for _ in 0..len * 3 {
        let a = rng.gen_range(0..len);
        let b = rng.gen_range(0..len);
        order.swap(a, b);
    }
}

/// What a given player is allowed to see of the current word
fn word_for(player: &Player, word: &str) -> String {
    if player.currently_drawing || player.already_answered {
        word.to_string()
    } else {
        mask_word(word, &player.revealed_hints)
    }
}

/// Game state machine
///
/// All mutations happen through `&mut self` from one task, so checks such as
/// "is the round over" and the actions that follow them cannot race.
pub struct Scheduler {
    lobby: Lobby,
    round: Option<RoundState>,
    words: WordList,
    rng: StdRng,
    config: GameConfig,
}

impl Scheduler {
    pub fn new(config: GameConfig, words: WordList) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            lobby: Lobby::new(config.max_players),
            round: None,
            words,
            rng,
            config,
        }
    }

    pub fn handle_event(&mut self, event: GameEvent, now: Instant) {
        match event {
            GameEvent::Connect { outbound, reply } => {
                let admitted = self.admit(outbound);
                if reply.send(admitted).is_err() {
                    // Session gave up before hearing back
                    if let Some(id) = admitted {
                        self.remove_player(id, now);
                    }
                }
            }
            GameEvent::Join { id, name } => self.join(id, name),
            GameEvent::Disconnect { id } => self.remove_player(id, now),
            GameEvent::LobbyChat { id, text } => self.lobby_chat(id, text),
            GameEvent::GameChat { id, text } => self.game_chat(id, text),
            GameEvent::StartGame { id } => self.start_game(id, now),
            GameEvent::Stroke { id, stroke } => self.relay_stroke(id, stroke),
            GameEvent::StopDrawing { id } => self.stop_drawing(id),
        }
    }

    /// Admits a new connection if the lobby is open and has room
    ///
    /// The connection receives the accept or deny frame through its outbound
    /// queue either way.
    pub fn admit(&mut self, outbound: Outbound) -> Option<PlayerId> {
        if self.round.is_some() {
            info!("Denying connection: game in progress");
            outbound.send(ServerFrame::JoinDenied);
            return None;
        }

        match self.lobby.add(outbound.clone()) {
            Some((id, _)) => {
                outbound.send(ServerFrame::JoinAccepted);
                Some(id)
            }
            None => {
                info!("Denying connection: lobby full");
                outbound.send(ServerFrame::JoinDenied);
                None
            }
        }
    }

    /// Records a player's name and introduces them to everyone else
    pub fn join(&mut self, id: PlayerId, name: String) {
        let Some(player) = self.lobby.get_mut(id) else {
            debug!("Join from unknown player {}", id);
            return;
        };
        player.name = Some(name.clone());
        let index = player.wire_index();
        info!("Player {} is now known as {:?}", id, name);

        let announcement = ServerFrame::PlayerJoined { index, name };
        let mut introductions = Vec::new();
        for other in self.lobby.iter() {
            other.send(announcement.clone());
            if other.id != id {
                if let Some(other_name) = &other.name {
                    introductions.push(ServerFrame::PlayerJoined {
                        index: other.wire_index(),
                        name: other_name.clone(),
                    });
                }
            }
        }

        for frame in introductions {
            self.lobby.send_to(id, frame);
        }
    }

    /// Drops a player; repeated calls for the same ID do nothing
    pub fn remove_player(&mut self, id: PlayerId, now: Instant) {
        let Some(index) = self.lobby.get(id).map(|p| p.wire_index()) else {
            return;
        };

        self.lobby
            .broadcast_except(id, &ServerFrame::PlayerRemoved { index });
        self.lobby.remove(id);

        let was_drawer = match self.round.as_mut() {
            Some(round) => {
                round.turn_order.retain(|p| *p != id);
                round.turn_queue.retain(|p| *p != id);
                round.drawer == Some(id)
            }
            None => return,
        };

        if self.lobby.len() <= 1 {
            info!("Not enough players left to continue");
            self.finish_game();
        } else if was_drawer {
            info!("Drawer left, moving to the next turn");
            self.advance_turn(now);
        }
    }

    pub fn lobby_chat(&mut self, id: PlayerId, text: String) {
        let Some(sender) = self.lobby.get(id) else {
            return;
        };
        let frame = ServerFrame::Chat {
            sender: sender.wire_index(),
            text,
        };
        self.lobby.broadcast(&frame);
    }

    /// In-game chat: correct answers are consumed, everything else relayed
    pub fn game_chat(&mut self, id: PlayerId, text: String) {
        let Some(round) = self.round.as_ref() else {
            debug!("Ignoring game chat from {} outside a game", id);
            return;
        };

        if text.to_lowercase() == round.word.to_lowercase() {
            self.handle_correct_guess(id);
            return;
        }

        let Some(sender) = self.lobby.get(id) else {
            return;
        };
        if sender.currently_drawing {
            debug!("Suppressing chat from drawer {}", id);
            return;
        }

        let frame = ServerFrame::Chat {
            sender: sender.wire_index(),
            text,
        };
        self.lobby.broadcast(&frame);
    }

    fn handle_correct_guess(&mut self, id: PlayerId) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        let Some(guesser) = self.lobby.get(id) else {
            return;
        };
        if guesser.already_answered || guesser.currently_drawing {
            debug!("Player {} already has this word", id);
            return;
        }

        let guesser_index = guesser.wire_index();
        let name = guesser
            .name
            .clone()
            .unwrap_or_else(|| format!("Player {}", guesser_index + 1));
        let credit = guesser_score(self.lobby.len(), round.correct_count);

        self.lobby.broadcast(&ServerFrame::Broadcast {
            text: format!("{} guessed the right word", name),
        });
        self.lobby.broadcast(&ServerFrame::Score {
            index: guesser_index,
            delta: credit,
        });
        if let Some(drawer) = round.drawer.and_then(|d| self.lobby.get(d)) {
            self.lobby.broadcast(&ServerFrame::Score {
                index: drawer.wire_index(),
                delta: DRAWER_SCORE,
            });
        }

        round.correct_count += 1;
        info!("{} guessed {:?} for {} points", name, round.word, credit);

        let word = round.word.clone();
        if let Some(guesser) = self.lobby.get_mut(id) {
            guesser.already_answered = true;
            guesser.send(ServerFrame::Word { text: word });
        }
    }

    /// Begins a game if at least two players are waiting in the lobby
    pub fn start_game(&mut self, requested_by: PlayerId, now: Instant) {
        if self.round.is_some() {
            debug!("Start from {} ignored: game already running", requested_by);
            return;
        }
        if self.lobby.len() < 2 {
            debug!("Start from {} ignored: not enough players", requested_by);
            return;
        }

        self.lobby.broadcast(&ServerFrame::GameStarted);

        let mut turn_order = self.lobby.ids();
        shuffle_turn_order(&mut turn_order, &mut self.rng);
        let mut turn_queue: VecDeque<PlayerId> = turn_order.iter().copied().collect();
        let drawer = turn_queue.pop_front();

        self.round = Some(RoundState {
            word: self.words.pick(&mut self.rng).to_string(),
            rounds_remaining: i64::from(self.config.rounds),
            turn_order,
            turn_queue,
            drawer,
            round_start: now,
            hints: [None, None],
            correct_count: 0,
        });

        info!(
            "Game started by player {} with {} players",
            requested_by,
            self.lobby.len()
        );
        self.begin_turn();
    }

    /// Moves to the next drawer, refilling the queue or finishing as needed
    fn advance_turn(&mut self, now: Instant) {
        let Some(round) = self.round.as_mut() else {
            return;
        };

        if round.rounds_remaining < 0 {
            self.finish_game();
            return;
        }
        if round.turn_queue.is_empty() {
            round.rounds_remaining -= 1;
            round.turn_queue.extend(round.turn_order.iter().copied());
        }

        let Some(drawer) = round.turn_queue.pop_front() else {
            self.finish_game();
            return;
        };

        round.drawer = Some(drawer);
        round.word = self.words.pick(&mut self.rng).to_string();
        round.hints = [None, None];
        round.correct_count = 0;
        round.round_start = now;

        self.begin_turn();
    }

    /// Resets every player for the current drawer and sends the turn frames
    fn begin_turn(&mut self) {
        let Some(round) = self.round.as_ref() else {
            return;
        };
        let Some(drawer_index) = round
            .drawer
            .and_then(|d| self.lobby.get(d))
            .map(|p| p.wire_index())
        else {
            return;
        };

        for player in self.lobby.iter_mut() {
            player.reset_turn_flags();
            player.currently_drawing = Some(player.id) == round.drawer;
            player.already_answered = player.currently_drawing;

            player.send(ServerFrame::ResetCanvas);
            player.send(ServerFrame::Word {
                text: word_for(player, &round.word),
            });
            player.send(ServerFrame::Turn {
                index: drawer_index,
            });
        }

        debug!(
            "Player at index {} is drawing {:?}, {} rounds remaining",
            drawer_index, round.word, round.rounds_remaining
        );
    }

    fn finish_game(&mut self) {
        if self.round.take().is_none() {
            return;
        }

        self.lobby.broadcast(&ServerFrame::GameFinished);
        for player in self.lobby.iter_mut() {
            player.reset_turn_flags();
        }
        info!("Game finished, lobby is open again");
    }

    /// Round clock: broadcasts time left, reveals hints, ends turns
    pub fn tick(&mut self, now: Instant) {
        let Some(round) = self.round.as_ref() else {
            return;
        };

        let elapsed = now.saturating_duration_since(round.round_start);
        let remaining =
            (self.config.round_duration.as_millis() as i64 - elapsed.as_millis() as i64) / 1000;
        let word_len = round.word.chars().count();

        self.lobby.broadcast(&ServerFrame::TimeRemaining {
            seconds: remaining as i32,
        });

        if remaining <= FIRST_HINT_SECS {
            self.reveal_hint(0);
        }
        if remaining <= SECOND_HINT_SECS && word_len >= SECOND_HINT_MIN_LEN {
            self.reveal_hint(1);
        }
        if remaining <= 0 && elapsed >= self.config.round_duration {
            info!("Time is up");
            self.advance_turn(now);
        }
    }

    /// Picks the hint position for `slot` once, then sends it to eligible guessers
    fn reveal_hint(&mut self, slot: usize) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        let word_len = round.word.chars().count();
        if word_len == 0 {
            return;
        }

        let position = match round.hints[slot] {
            Some(position) => position,
            None => {
                let position = self.rng.gen_range(0..word_len);
                round.hints[slot] = Some(position);
                debug!("Hint {} reveals position {}", slot, position);
                position
            }
        };

        for player in self.lobby.iter_mut() {
            if player.currently_drawing
                || player.already_answered
                || player.revealed_hints[slot].is_some()
            {
                continue;
            }
            player.revealed_hints[slot] = Some(position);
            player.send(ServerFrame::Word {
                text: mask_word(&round.word, &player.revealed_hints),
            });
        }
    }

    pub fn relay_stroke(&mut self, id: PlayerId, stroke: Stroke) {
        match self.lobby.get(id) {
            Some(sender) if sender.currently_drawing => {
                self.lobby.broadcast(&ServerFrame::Stroke(stroke));
            }
            _ => debug!("Dropping stroke from non-drawer {}", id),
        }
    }

    pub fn stop_drawing(&mut self, id: PlayerId) {
        if self.lobby.get(id).is_some() {
            self.lobby.broadcast(&ServerFrame::StopDrawing);
        }
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    /// True while a game is running and new connections are turned away
    pub fn is_game_active(&self) -> bool {
        self.round.is_some()
    }

    pub fn current_word(&self) -> Option<&str> {
        self.round.as_ref().map(|r| r.word.as_str())
    }

    pub fn drawer(&self) -> Option<PlayerId> {
        self.round.as_ref().and_then(|r| r.drawer)
    }

    pub fn rounds_remaining(&self) -> Option<i64> {
        self.round.as_ref().map(|r| r.rounds_remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::sync::mpsc::Receiver;

    const SEED: u64 = 42;

    fn scheduler_with(word: &str, rounds: u32) -> Scheduler {
        let config = GameConfig {
            rounds,
            seed: Some(SEED),
            ..GameConfig::default()
        };
        let words = WordList::new(vec![word.to_string()]).unwrap();
        Scheduler::new(config, words)
    }

    /// Admits and names `count` players, returning their IDs and frame queues
    fn add_players(
        scheduler: &mut Scheduler,
        count: usize,
    ) -> Vec<(PlayerId, Receiver<ServerFrame>)> {
        let mut players = Vec::new();
        for n in 0..count {
            let (outbound, rx) = Outbound::channel();
            let id = scheduler.admit(outbound).unwrap();
            scheduler.join(id, format!("p{}", n));
            players.push((id, rx));
        }
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }
        players
    }

    fn drain(rx: &mut Receiver<ServerFrame>) -> Vec<ServerFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn drawers(scheduler: &Scheduler) -> Vec<PlayerId> {
        scheduler
            .lobby()
            .iter()
            .filter(|p| p.currently_drawing)
            .map(|p| p.id)
            .collect()
    }

    fn assert_single_drawer(scheduler: &Scheduler) {
        let drawing = drawers(scheduler);
        assert_eq!(drawing.len(), 1);
        assert_eq!(scheduler.drawer(), Some(drawing[0]));
        assert!(scheduler.lobby().get(drawing[0]).unwrap().already_answered);
    }

    fn index_of(scheduler: &Scheduler, id: PlayerId) -> i32 {
        scheduler.lobby().get(id).unwrap().wire_index()
    }

    #[test]
    fn test_guesser_score() {
        assert_eq!(guesser_score(4, 0), 32);
        assert_eq!(guesser_score(4, 1), 28);
        assert_eq!(guesser_score(3, 0), 28);
        assert_eq!(guesser_score(2, 1), 20);
    }

    #[test]
    fn test_mask_word() {
        assert_eq!(mask_word("giraffe", &[None, None]), "???????");
        assert_eq!(mask_word("giraffe", &[Some(0), None]), "g??????");
        assert_eq!(mask_word("giraffe", &[Some(0), Some(6)]), "g?????e");
        assert_eq!(mask_word("cat", &[Some(9), None]), "???");
        assert_eq!(mask_word("", &[None, None]), "");
    }

    #[test]
    fn test_shuffle_keeps_every_player() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut order: Vec<PlayerId> = (1..=6).collect();
        shuffle_turn_order(&mut order, &mut rng);

        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, (1..=6).collect::<Vec<_>>());
    }

    #[test]
    fn test_join_introduces_players_both_ways() {
        let mut scheduler = scheduler_with("cat", 3);
        let (a, mut rx_a) = Outbound::channel();
        let (b, mut rx_b) = Outbound::channel();

        let id_a = scheduler.admit(a).unwrap();
        scheduler.join(id_a, "alice".to_string());
        let id_b = scheduler.admit(b).unwrap();
        scheduler.join(id_b, "bob".to_string());

        assert_eq!(
            drain(&mut rx_a),
            vec![
                ServerFrame::JoinAccepted,
                ServerFrame::PlayerJoined { index: 0, name: "alice".to_string() },
                ServerFrame::PlayerJoined { index: 1, name: "bob".to_string() },
            ]
        );

        let frames_b = drain(&mut rx_b);
        assert_eq!(frames_b[0], ServerFrame::JoinAccepted);
        assert!(frames_b.contains(&ServerFrame::PlayerJoined { index: 0, name: "alice".to_string() }));
        assert!(frames_b.contains(&ServerFrame::PlayerJoined { index: 1, name: "bob".to_string() }));
        assert_eq!(frames_b.len(), 3);
    }

    #[test]
    fn test_start_requires_two_players() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 1);

        scheduler.start_game(players[0].0, Instant::now());

        assert!(!scheduler.is_game_active());
        assert!(drain(&mut players[0].1).is_empty());
    }

    #[test]
    fn test_start_assigns_single_drawer() {
        for count in 2..=6 {
            let mut scheduler = scheduler_with("cat", 3);
            let _players = add_players(&mut scheduler, count);

            scheduler.start_game(1, Instant::now());

            assert!(scheduler.is_game_active());
            assert_single_drawer(&scheduler);
            let answered = scheduler.lobby().iter().filter(|p| p.already_answered).count();
            assert_eq!(answered, 1);
        }
    }

    #[test]
    fn test_start_sends_turn_frames() {
        let mut scheduler = scheduler_with("giraffe", 3);
        let mut players = add_players(&mut scheduler, 3);

        scheduler.start_game(players[0].0, Instant::now());
        let drawer = scheduler.drawer().unwrap();
        let drawer_index = index_of(&scheduler, drawer);

        for (id, rx) in players.iter_mut() {
            let expected_word = if *id == drawer { "giraffe" } else { "???????" };
            assert_eq!(
                drain(rx),
                vec![
                    ServerFrame::GameStarted,
                    ServerFrame::ResetCanvas,
                    ServerFrame::Word { text: expected_word.to_string() },
                    ServerFrame::Turn { index: drawer_index },
                ]
            );
        }
    }

    #[test]
    fn test_second_start_ignored() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 2);
        let now = Instant::now();

        scheduler.start_game(players[0].0, now);
        let drawer = scheduler.drawer();
        drain(&mut players[1].1);

        scheduler.start_game(players[1].0, now);
        assert_eq!(scheduler.drawer(), drawer);
        assert!(drain(&mut players[1].1).is_empty());
    }

    #[test]
    fn test_admission_denied_during_game() {
        let mut scheduler = scheduler_with("cat", 3);
        let _players = add_players(&mut scheduler, 2);
        scheduler.start_game(1, Instant::now());

        let (late, mut rx) = Outbound::channel();
        assert!(scheduler.admit(late).is_none());
        assert_eq!(drain(&mut rx), vec![ServerFrame::JoinDenied]);
        assert_eq!(scheduler.lobby().len(), 2);
    }

    #[test]
    fn test_admission_denied_when_full() {
        let config = GameConfig {
            max_players: 2,
            ..GameConfig::default()
        };
        let mut scheduler = Scheduler::new(config, WordList::builtin());
        let _players = add_players(&mut scheduler, 2);

        let (extra, mut rx) = Outbound::channel();
        assert!(scheduler.admit(extra).is_none());
        assert_eq!(drain(&mut rx), vec![ServerFrame::JoinDenied]);
    }

    #[test]
    fn test_scoring_with_four_players() {
        let mut scheduler = scheduler_with("giraffe", 3);
        let mut players = add_players(&mut scheduler, 4);
        scheduler.start_game(1, Instant::now());

        let drawer = scheduler.drawer().unwrap();
        let drawer_index = index_of(&scheduler, drawer);
        let guessers: Vec<PlayerId> = players.iter().map(|p| p.0).filter(|id| *id != drawer).collect();
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }

        let first = guessers[0];
        scheduler.game_chat(first, "GiRaFfE".to_string());

        let first_index = index_of(&scheduler, first);
        let (_, first_rx) = players.iter_mut().find(|p| p.0 == first).unwrap();
        assert_eq!(
            drain(first_rx),
            vec![
                ServerFrame::Broadcast {
                    text: format!("p{} guessed the right word", first - 1)
                },
                ServerFrame::Score { index: first_index, delta: 32 },
                ServerFrame::Score { index: drawer_index, delta: DRAWER_SCORE },
                ServerFrame::Word { text: "giraffe".to_string() },
            ]
        );

        let second = guessers[1];
        let second_index = index_of(&scheduler, second);
        scheduler.game_chat(second, "giraffe".to_string());

        let (_, drawer_rx) = players.iter_mut().find(|p| p.0 == drawer).unwrap();
        let scores: Vec<ServerFrame> = drain(drawer_rx)
            .into_iter()
            .filter(|f| matches!(f, ServerFrame::Score { .. }))
            .collect();
        assert_eq!(
            scores,
            vec![
                ServerFrame::Score { index: first_index, delta: 32 },
                ServerFrame::Score { index: drawer_index, delta: DRAWER_SCORE },
                ServerFrame::Score { index: second_index, delta: 28 },
                ServerFrame::Score { index: drawer_index, delta: DRAWER_SCORE },
            ]
        );
    }

    #[test]
    fn test_repeated_guess_scores_once() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 3);
        scheduler.start_game(1, Instant::now());

        let drawer = scheduler.drawer().unwrap();
        let guesser = players.iter().map(|p| p.0).find(|id| *id != drawer).unwrap();

        scheduler.game_chat(guesser, "cat".to_string());
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }

        scheduler.game_chat(guesser, "cat".to_string());
        scheduler.game_chat(guesser, "CAT".to_string());

        for (_, rx) in players.iter_mut() {
            assert!(drain(rx).is_empty());
        }
        assert!(scheduler.lobby().get(guesser).unwrap().already_answered);
    }

    #[test]
    fn test_drawer_cannot_score_or_chat() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 3);
        scheduler.start_game(1, Instant::now());
        let drawer = scheduler.drawer().unwrap();
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }

        scheduler.game_chat(drawer, "cat".to_string());
        scheduler.game_chat(drawer, "it has whiskers".to_string());

        for (_, rx) in players.iter_mut() {
            assert!(drain(rx).is_empty());
        }
    }

    #[test]
    fn test_wrong_guess_relayed_as_chat() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 3);
        scheduler.start_game(1, Instant::now());
        let drawer = scheduler.drawer().unwrap();
        let guesser = players.iter().map(|p| p.0).find(|id| *id != drawer).unwrap();
        let guesser_index = index_of(&scheduler, guesser);
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }

        scheduler.game_chat(guesser, "dog?".to_string());

        for (_, rx) in players.iter_mut() {
            assert_eq!(
                drain(rx),
                vec![ServerFrame::Chat { sender: guesser_index, text: "dog?".to_string() }]
            );
        }
    }

    #[test]
    fn test_game_chat_ignored_outside_game() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 2);

        scheduler.game_chat(players[0].0, "cat".to_string());
        scheduler.game_chat(players[0].0, "hello".to_string());

        assert!(drain(&mut players[1].1).is_empty());
    }

    #[test]
    fn test_lobby_chat_relayed_to_everyone() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 2);

        scheduler.lobby_chat(players[1].0, "ready?".to_string());

        for (_, rx) in players.iter_mut() {
            assert_eq!(
                drain(rx),
                vec![ServerFrame::Chat { sender: 1, text: "ready?".to_string() }]
            );
        }
    }

    #[test]
    fn test_strokes_only_from_drawer() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 2);
        scheduler.start_game(1, Instant::now());
        let drawer = scheduler.drawer().unwrap();
        let guesser = players.iter().map(|p| p.0).find(|id| *id != drawer).unwrap();
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }

        let stroke = Stroke::new(3, (255, 0, 0), (10, 20));
        scheduler.relay_stroke(guesser, stroke);
        for (_, rx) in players.iter_mut() {
            assert!(drain(rx).is_empty());
        }

        scheduler.relay_stroke(drawer, stroke);
        scheduler.stop_drawing(drawer);
        for (_, rx) in players.iter_mut() {
            assert_eq!(
                drain(rx),
                vec![ServerFrame::Stroke(stroke), ServerFrame::StopDrawing]
            );
        }
    }

    #[test]
    fn test_stop_drawing_relayed_from_anyone() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 3);

        // Lobby, no game running
        scheduler.stop_drawing(players[1].0);
        for (_, rx) in players.iter_mut() {
            assert_eq!(drain(rx), vec![ServerFrame::StopDrawing]);
        }

        scheduler.start_game(players[0].0, Instant::now());
        let drawer = scheduler.drawer().unwrap();
        let guesser = players.iter().map(|p| p.0).find(|id| *id != drawer).unwrap();
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }

        scheduler.stop_drawing(guesser);
        for (_, rx) in players.iter_mut() {
            assert_eq!(drain(rx), vec![ServerFrame::StopDrawing]);
        }
    }

    #[test]
    fn test_time_remaining_truncates() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 2);
        let start = Instant::now();
        scheduler.start_game(1, start);
        drain(&mut players[0].1);

        scheduler.tick(start + Duration::from_millis(500));
        scheduler.tick(start + Duration::from_millis(1999));

        assert_eq!(
            drain(&mut players[0].1),
            vec![
                ServerFrame::TimeRemaining { seconds: 39 },
                ServerFrame::TimeRemaining { seconds: 38 },
            ]
        );
    }

    #[test]
    fn test_tick_without_game_is_silent() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 2);

        scheduler.tick(Instant::now());

        assert!(drain(&mut players[0].1).is_empty());
    }

    #[test]
    fn test_hints_revealed_to_guessers() {
        let mut scheduler = scheduler_with("giraffe", 3);
        let mut players = add_players(&mut scheduler, 3);
        let start = Instant::now();
        scheduler.start_game(1, start);
        let drawer = scheduler.drawer().unwrap();
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }

        scheduler.tick(start + Duration::from_secs(20));

        for (id, rx) in players.iter_mut() {
            let words: Vec<String> = drain(rx)
                .into_iter()
                .filter_map(|f| match f {
                    ServerFrame::Word { text } => Some(text),
                    _ => None,
                })
                .collect();

            if *id == drawer {
                assert!(words.is_empty());
            } else {
                assert_eq!(words.len(), 1);
                let revealed = words[0].chars().filter(|c| *c != HINT_PLACEHOLDER).count();
                assert_eq!(revealed, 1);
                assert_eq!(words[0].chars().count(), 7);
            }
        }

        // The same slot is never sent twice
        scheduler.tick(start + Duration::from_secs(21));
        for (_, rx) in players.iter_mut() {
            assert!(!drain(rx).iter().any(|f| matches!(f, ServerFrame::Word { .. })));
        }

        scheduler.tick(start + Duration::from_secs(30));
        let guesser = players.iter_mut().find(|p| p.0 != drawer).unwrap();
        let second: Vec<ServerFrame> = drain(&mut guesser.1)
            .into_iter()
            .filter(|f| matches!(f, ServerFrame::Word { .. }))
            .collect();
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_short_word_gets_one_hint() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 2);
        let start = Instant::now();
        scheduler.start_game(1, start);
        let drawer = scheduler.drawer().unwrap();
        let guesser = players.iter_mut().find(|p| p.0 != drawer).unwrap();
        drain(&mut guesser.1);

        scheduler.tick(start + Duration::from_secs(25));
        scheduler.tick(start + Duration::from_secs(35));

        let words: Vec<ServerFrame> = drain(&mut guesser.1)
            .into_iter()
            .filter(|f| matches!(f, ServerFrame::Word { .. }))
            .collect();
        assert_eq!(words.len(), 1);
    }

    #[test]
    fn test_answered_player_gets_no_hint() {
        let mut scheduler = scheduler_with("giraffe", 3);
        let mut players = add_players(&mut scheduler, 2);
        let start = Instant::now();
        scheduler.start_game(1, start);
        let drawer = scheduler.drawer().unwrap();
        let guesser = players.iter_mut().find(|p| p.0 != drawer).unwrap();

        scheduler.game_chat(guesser.0, "giraffe".to_string());
        drain(&mut guesser.1);

        scheduler.tick(start + Duration::from_secs(20));
        assert!(!drain(&mut guesser.1)
            .iter()
            .any(|f| matches!(f, ServerFrame::Word { .. })));
    }

    #[test]
    fn test_every_player_draws_once_per_pass() {
        let mut scheduler = scheduler_with("cat", 3);
        let _players = add_players(&mut scheduler, 4);
        let mut now = Instant::now();
        scheduler.start_game(1, now);

        let everyone: HashSet<PlayerId> = scheduler.lobby().ids().into_iter().collect();

        // Three passes, crossing two refills
        for _ in 0..3 {
            let mut seen = HashSet::new();
            for _ in 0..4 {
                assert_single_drawer(&scheduler);
                seen.insert(scheduler.drawer().unwrap());
                now += Duration::from_secs(40);
                scheduler.tick(now);
            }
            assert_eq!(seen, everyone);
        }
    }

    #[test]
    fn test_game_finishes_after_final_pass() {
        let mut scheduler = scheduler_with("cat", 1);
        let mut players = add_players(&mut scheduler, 2);
        let mut now = Instant::now();
        scheduler.start_game(1, now);

        // Two full passes, then one more turn from the last refill
        for turn in 0..5 {
            assert!(scheduler.is_game_active(), "game ended early at turn {}", turn);
            assert_single_drawer(&scheduler);
            now += Duration::from_secs(40);
            scheduler.tick(now);
        }

        assert!(!scheduler.is_game_active());
        assert!(drain(&mut players[0].1).contains(&ServerFrame::GameFinished));
        assert!(scheduler.lobby().iter().all(|p| !p.currently_drawing && !p.already_answered));

        // Lobby is joinable again
        let (late, _rx) = Outbound::channel();
        assert!(scheduler.admit(late).is_some());
    }

    #[test]
    fn test_default_game_length() {
        let mut scheduler = scheduler_with("cat", 3);
        let _players = add_players(&mut scheduler, 2);
        let mut now = Instant::now();
        scheduler.start_game(1, now);

        let mut turns = 0;
        while scheduler.is_game_active() {
            assert!(turns < 20, "game never finished");
            turns += 1;
            now += Duration::from_secs(40);
            scheduler.tick(now);
        }

        // Four passes of two players plus the turn after the last refill
        assert_eq!(turns, 9);
    }

    #[test]
    fn test_rounds_counter_goes_negative_before_finish() {
        let mut scheduler = scheduler_with("cat", 0);
        let _players = add_players(&mut scheduler, 2);
        let mut now = Instant::now();
        scheduler.start_game(1, now);
        assert_eq!(scheduler.rounds_remaining(), Some(0));

        now += Duration::from_secs(40);
        scheduler.tick(now);
        assert_eq!(scheduler.rounds_remaining(), Some(0));

        now += Duration::from_secs(40);
        scheduler.tick(now);
        assert_eq!(scheduler.rounds_remaining(), Some(-1));
        assert_single_drawer(&scheduler);

        now += Duration::from_secs(40);
        scheduler.tick(now);
        assert_eq!(scheduler.rounds_remaining(), None);
    }

    #[test]
    fn test_turn_not_advanced_before_time_is_up() {
        let mut scheduler = scheduler_with("cat", 3);
        let _players = add_players(&mut scheduler, 3);
        let start = Instant::now();
        scheduler.start_game(1, start);
        let drawer = scheduler.drawer();

        scheduler.tick(start + Duration::from_millis(39_999));

        assert_eq!(scheduler.drawer(), drawer);
    }

    #[test]
    fn test_removal_reindexes_and_notifies_once() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 4);
        let now = Instant::now();
        let leaving = players[1].0;

        scheduler.remove_player(leaving, now);
        scheduler.remove_player(leaving, now);

        for (id, rx) in players.iter_mut().filter(|p| p.0 != leaving) {
            assert_eq!(drain(rx), vec![ServerFrame::PlayerRemoved { index: 1 }]);
            assert!(scheduler.lobby().get(*id).is_some());
        }
        let indices: Vec<usize> = scheduler.lobby().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_last_opponent_leaving_finishes_game() {
        let mut scheduler = scheduler_with("cat", 3);
        let mut players = add_players(&mut scheduler, 2);
        let now = Instant::now();
        scheduler.start_game(1, now);
        drain(&mut players[0].1);

        scheduler.remove_player(players[1].0, now);

        assert!(!scheduler.is_game_active());
        assert_eq!(
            drain(&mut players[0].1),
            vec![ServerFrame::PlayerRemoved { index: 1 }, ServerFrame::GameFinished]
        );
        assert!(!scheduler.lobby().get(players[0].0).unwrap().currently_drawing);
    }

    #[test]
    fn test_drawer_leaving_advances_turn() {
        let mut scheduler = scheduler_with("cat", 3);
        let _players = add_players(&mut scheduler, 3);
        let now = Instant::now();
        scheduler.start_game(1, now);
        let drawer = scheduler.drawer().unwrap();

        scheduler.remove_player(drawer, now);

        assert!(scheduler.is_game_active());
        assert_ne!(scheduler.drawer(), Some(drawer));
        assert_single_drawer(&scheduler);
    }

    #[test]
    fn test_guesser_leaving_keeps_turn() {
        let mut scheduler = scheduler_with("cat", 3);
        let players = add_players(&mut scheduler, 3);
        let now = Instant::now();
        scheduler.start_game(1, now);
        let drawer = scheduler.drawer().unwrap();
        let guesser = players.iter().map(|p| p.0).find(|id| *id != drawer).unwrap();

        scheduler.remove_player(guesser, now);

        assert_eq!(scheduler.drawer(), Some(drawer));
        assert_single_drawer(&scheduler);
    }

    #[test]
    fn test_connect_event_replies_with_id() {
        let mut scheduler = scheduler_with("cat", 3);
        let (outbound, mut rx) = Outbound::channel();
        let (reply_tx, mut reply_rx) = oneshot::channel();

        scheduler.handle_event(
            GameEvent::Connect { outbound, reply: reply_tx },
            Instant::now(),
        );

        assert_eq!(reply_rx.try_recv().unwrap(), Some(1));
        assert_eq!(drain(&mut rx), vec![ServerFrame::JoinAccepted]);
    }

    #[test]
    fn test_connect_abandoned_before_reply() {
        let mut scheduler = scheduler_with("cat", 3);
        let (outbound, _rx) = Outbound::channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        drop(reply_rx);

        scheduler.handle_event(
            GameEvent::Connect { outbound, reply: reply_tx },
            Instant::now(),
        );

        assert!(scheduler.lobby().is_empty());
    }
}
