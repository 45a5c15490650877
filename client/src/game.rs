//! Local model of the lobby and game, rebuilt from server frames

use shared::{ServerFrame, Stroke};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub name: String,
    pub score: i32,
}

/// Everything a client knows about the game
#[derive(Debug, Default)]
pub struct ClientGameState {
    /// Players by positional index; gaps are slots announced out of order
    pub roster: Vec<Option<RosterEntry>>,
    pub in_game: bool,
    /// Current word, masked unless this client is drawing or has guessed it
    pub word: Option<String>,
    pub seconds_left: Option<i32>,
    pub drawer: Option<usize>,
    /// Canvas contents as separate pen-down runs
    pub strokes: Vec<Vec<Stroke>>,
    pen_down: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one frame and returns a line worth showing the user, if any
    pub fn apply(&mut self, frame: &ServerFrame) -> Option<String> {
        match frame {
            ServerFrame::Heartbeat | ServerFrame::JoinAccepted | ServerFrame::JoinDenied => None,

            ServerFrame::PlayerJoined { index, name } => {
                let index = usize::try_from(*index).ok()?;
                if self.roster.len() <= index {
                    self.roster.resize(index + 1, None);
                }
                self.roster[index] = Some(RosterEntry {
                    name: name.clone(),
                    score: 0,
                });
                Some(format!("{} joined", name))
            }

            ServerFrame::PlayerRemoved { index } => {
                let index = usize::try_from(*index).ok()?;
                if index >= self.roster.len() {
                    return None;
                }
                let removed = self.roster.remove(index);
                // Drawer index shifts with everyone else
                self.drawer = match self.drawer {
                    Some(d) if d == index => None,
                    Some(d) if d > index => Some(d - 1),
                    other => other,
                };
                removed.map(|p| format!("{} left", p.name))
            }

            ServerFrame::Chat { sender, text } => {
                Some(format!("{}: {}", self.name_at(*sender as usize), text))
            }

            ServerFrame::GameStarted => {
                self.in_game = true;
                for entry in self.roster.iter_mut().flatten() {
                    entry.score = 0;
                }
                Some("Game started".to_string())
            }

            ServerFrame::Word { text } => {
                self.word = Some(text.clone());
                Some(format!("Word: {}", text))
            }

            ServerFrame::TimeRemaining { seconds } => {
                self.seconds_left = Some(*seconds);
                None
            }

            ServerFrame::Score { index, delta } => {
                let entry = self.roster.get_mut(*index as usize)?.as_mut()?;
                entry.score += delta;
                None
            }

            ServerFrame::ResetCanvas => {
                self.strokes.clear();
                self.pen_down = false;
                None
            }

            ServerFrame::Turn { index } => {
                self.drawer = Some(*index as usize);
                Some(format!("{} is drawing", self.name_at(*index as usize)))
            }

            ServerFrame::Stroke(stroke) => {
                match self.strokes.last_mut() {
                    Some(run) if self.pen_down => run.push(*stroke),
                    _ => self.strokes.push(vec![*stroke]),
                }
                self.pen_down = true;
                None
            }

            ServerFrame::StopDrawing => {
                self.pen_down = false;
                None
            }

            ServerFrame::Broadcast { text } => Some(text.clone()),

            ServerFrame::GameFinished => {
                self.in_game = false;
                self.word = None;
                self.seconds_left = None;
                self.drawer = None;
                Some(format!("Game finished. {}", self.scoreboard()))
            }
        }
    }

    pub fn name_at(&self, index: usize) -> &str {
        self.roster
            .get(index)
            .and_then(|e| e.as_ref())
            .map(|e| e.name.as_str())
            .unwrap_or("?")
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.roster
            .iter()
            .position(|e| e.as_ref().map(|e| e.name == name).unwrap_or(false))
    }

    pub fn score_of(&self, index: usize) -> Option<i32> {
        self.roster.get(index)?.as_ref().map(|e| e.score)
    }

    pub fn is_drawing(&self, name: &str) -> bool {
        self.in_game && self.drawer.is_some() && self.drawer == self.index_of(name)
    }

    /// Scores as "name score" pairs, highest first
    pub fn scoreboard(&self) -> String {
        let mut entries: Vec<&RosterEntry> = self.roster.iter().flatten().collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries
            .iter()
            .map(|e| format!("{} {}", e.name, e.score))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
