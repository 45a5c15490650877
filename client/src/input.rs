//! Terminal input parsing

/// What a typed line asks the client to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Quit,
    /// Chat text, sent as a guess while a game is running
    Say(String),
    Empty,
}

pub fn parse_line(line: &str) -> Command {
    let line = line.trim();
    match line {
        "" => Command::Empty,
        "/start" => Command::Start,
        "/quit" | "/exit" => Command::Quit,
        text => Command::Say(text.to_string()),
    }
}
