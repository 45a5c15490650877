//! Wire protocol shared by the game server and clients
//!
//! Every frame is a one-byte signed opcode followed by a payload whose shape is
//! fixed per opcode. There is no length header; the receiver knows the layout
//! of each opcode in advance. Integers are 4-byte big-endian `i32` values and
//! strings are an `i32` count of UTF-16 code units followed by the units
//! themselves (two bytes each, big-endian).
//!
//! Client and server share the numeric opcode space but not the payloads, so
//! each direction has its own frame enum: [`ClientFrame`] for what a player
//! sends and [`ServerFrame`] for what the server sends back.

use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Length of a drawing turn in seconds
pub const ROUND_DURATION_SECS: u64 = 40;
/// How often a heartbeat probe is sent on every connection
pub const HEARTBEAT_INTERVAL_MS: u64 = 500;
/// A connection that sends nothing for this long is dropped
pub const INACTIVITY_TIMEOUT_SECS: u64 = 10;
/// How many extra passes through the turn order follow the first one
pub const DEFAULT_ROUNDS: u32 = 3;
/// Longest string accepted off the wire, in UTF-16 code units
pub const MAX_STRING_UNITS: i32 = 4096;

pub mod opcode {
    pub const HEARTBEAT: i8 = 0;
    pub const JOIN_ACCEPTED: i8 = -1;
    pub const JOIN_DENIED: i8 = -2;
    pub const PLAYER: i8 = 1;
    pub const DISCONNECT: i8 = 2;
    pub const LOBBY_CHAT: i8 = 3;
    pub const START: i8 = 4;
    pub const WORD: i8 = 5;
    pub const TIME_REMAINING: i8 = 6;
    pub const SCORE: i8 = 7;
    pub const RESET_CANVAS: i8 = 8;
    pub const TURN: i8 = 9;
    pub const STROKE: i8 = 10;
    pub const STOP_DRAWING: i8 = 11;
    pub const GAME_CHAT: i8 = 12;
    pub const GAME_FINISHED: i8 = 13;
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("connection i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("unknown opcode {0}")]
    UnknownOpcode(i8),
    #[error("invalid string length {0}")]
    InvalidStringLength(i32),
}

impl ProtocolError {
    /// True when the peer simply went away rather than sending garbage
    pub fn is_closed(&self) -> bool {
        match self {
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// One segment of a drawing, relayed verbatim between players
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stroke {
    pub thickness: i32,
    pub red: i32,
    pub green: i32,
    pub blue: i32,
    pub x: i32,
    pub y: i32,
}

impl Stroke {
    pub fn new(thickness: i32, (red, green, blue): (i32, i32, i32), (x, y): (i32, i32)) -> Self {
        Self {
            thickness,
            red,
            green,
            blue,
            x,
            y,
        }
    }

    async fn read<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self, ProtocolError> {
        let mut raw = [0u8; 24];
        reader.read_exact(&mut raw).await?;
        let field = |i: usize| i32::from_be_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        Ok(Self {
            thickness: field(0),
            red: field(4),
            green: field(8),
            blue: field(12),
            x: field(16),
            y: field(20),
        })
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        for value in [
            self.thickness,
            self.red,
            self.green,
            self.blue,
            self.x,
            self.y,
        ] {
            put_i32(buf, value);
        }
    }
}

/// Frames sent from a player to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Heartbeat,
    Join { name: String },
    Disconnect,
    LobbyChat { text: String },
    StartRequest,
    Stroke(Stroke),
    StopDrawing,
    GameChat { text: String },
}

impl ClientFrame {
    pub fn opcode(&self) -> i8 {
        match self {
            ClientFrame::Heartbeat => opcode::HEARTBEAT,
            ClientFrame::Join { .. } => opcode::PLAYER,
            ClientFrame::Disconnect => opcode::DISCONNECT,
            ClientFrame::LobbyChat { .. } => opcode::LOBBY_CHAT,
            ClientFrame::StartRequest => opcode::START,
            ClientFrame::Stroke(_) => opcode::STROKE,
            ClientFrame::StopDrawing => opcode::STOP_DRAWING,
            ClientFrame::GameChat { .. } => opcode::GAME_CHAT,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode() as u8);
        match self {
            ClientFrame::Join { name } => put_string(buf, name),
            ClientFrame::LobbyChat { text } | ClientFrame::GameChat { text } => {
                put_string(buf, text)
            }
            ClientFrame::Stroke(stroke) => stroke.encode(buf),
            ClientFrame::Heartbeat
            | ClientFrame::Disconnect
            | ClientFrame::StartRequest
            | ClientFrame::StopDrawing => {}
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Frames sent from the server to a player
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Heartbeat,
    JoinAccepted,
    JoinDenied,
    PlayerJoined { index: i32, name: String },
    PlayerRemoved { index: i32 },
    Chat { sender: i32, text: String },
    GameStarted,
    Word { text: String },
    TimeRemaining { seconds: i32 },
    Score { index: i32, delta: i32 },
    ResetCanvas,
    Turn { index: i32 },
    Stroke(Stroke),
    StopDrawing,
    Broadcast { text: String },
    GameFinished,
}

impl ServerFrame {
    pub fn opcode(&self) -> i8 {
        match self {
            ServerFrame::Heartbeat => opcode::HEARTBEAT,
            ServerFrame::JoinAccepted => opcode::JOIN_ACCEPTED,
            ServerFrame::JoinDenied => opcode::JOIN_DENIED,
            ServerFrame::PlayerJoined { .. } => opcode::PLAYER,
            ServerFrame::PlayerRemoved { .. } => opcode::DISCONNECT,
            ServerFrame::Chat { .. } => opcode::LOBBY_CHAT,
            ServerFrame::GameStarted => opcode::START,
            ServerFrame::Word { .. } => opcode::WORD,
            ServerFrame::TimeRemaining { .. } => opcode::TIME_REMAINING,
            ServerFrame::Score { .. } => opcode::SCORE,
            ServerFrame::ResetCanvas => opcode::RESET_CANVAS,
            ServerFrame::Turn { .. } => opcode::TURN,
            ServerFrame::Stroke(_) => opcode::STROKE,
            ServerFrame::StopDrawing => opcode::STOP_DRAWING,
            ServerFrame::Broadcast { .. } => opcode::GAME_CHAT,
            ServerFrame::GameFinished => opcode::GAME_FINISHED,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.opcode() as u8);
        match self {
            ServerFrame::PlayerJoined { index, name } => {
                put_i32(buf, *index);
                put_string(buf, name);
            }
            ServerFrame::PlayerRemoved { index } | ServerFrame::Turn { index } => {
                put_i32(buf, *index)
            }
            ServerFrame::Chat { sender, text } => {
                put_i32(buf, *sender);
                put_string(buf, text);
            }
            ServerFrame::Word { text } | ServerFrame::Broadcast { text } => put_string(buf, text),
            ServerFrame::TimeRemaining { seconds } => put_i32(buf, *seconds),
            ServerFrame::Score { index, delta } => {
                put_i32(buf, *index);
                put_i32(buf, *delta);
            }
            ServerFrame::Stroke(stroke) => stroke.encode(buf),
            ServerFrame::Heartbeat
            | ServerFrame::JoinAccepted
            | ServerFrame::JoinDenied
            | ServerFrame::GameStarted
            | ServerFrame::ResetCanvas
            | ServerFrame::StopDrawing
            | ServerFrame::GameFinished => {}
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }
}

/// Reads one complete client frame, waiting for as many bytes as it needs
pub async fn read_client_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<ClientFrame, ProtocolError> {
    let code = reader.read_i8().await?;
    let frame = match code {
        opcode::HEARTBEAT => ClientFrame::Heartbeat,
        opcode::PLAYER => ClientFrame::Join {
            name: read_string(reader).await?,
        },
        opcode::DISCONNECT => ClientFrame::Disconnect,
        opcode::LOBBY_CHAT => ClientFrame::LobbyChat {
            text: read_string(reader).await?,
        },
        opcode::START => ClientFrame::StartRequest,
        opcode::STROKE => ClientFrame::Stroke(Stroke::read(reader).await?),
        opcode::STOP_DRAWING => ClientFrame::StopDrawing,
        opcode::GAME_CHAT => ClientFrame::GameChat {
            text: read_string(reader).await?,
        },
        other => return Err(ProtocolError::UnknownOpcode(other)),
    };
    Ok(frame)
}

/// Reads one complete server frame, waiting for as many bytes as it needs
pub async fn read_server_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<ServerFrame, ProtocolError> {
    let code = reader.read_i8().await?;
    let frame = match code {
        opcode::HEARTBEAT => ServerFrame::Heartbeat,
        opcode::JOIN_ACCEPTED => ServerFrame::JoinAccepted,
        opcode::JOIN_DENIED => ServerFrame::JoinDenied,
        opcode::PLAYER => ServerFrame::PlayerJoined {
            index: reader.read_i32().await?,
            name: read_string(reader).await?,
        },
        opcode::DISCONNECT => ServerFrame::PlayerRemoved {
            index: reader.read_i32().await?,
        },
        opcode::LOBBY_CHAT => ServerFrame::Chat {
            sender: reader.read_i32().await?,
            text: read_string(reader).await?,
        },
        opcode::START => ServerFrame::GameStarted,
        opcode::WORD => ServerFrame::Word {
            text: read_string(reader).await?,
        },
        opcode::TIME_REMAINING => ServerFrame::TimeRemaining {
            seconds: reader.read_i32().await?,
        },
        opcode::SCORE => ServerFrame::Score {
            index: reader.read_i32().await?,
            delta: reader.read_i32().await?,
        },
        opcode::RESET_CANVAS => ServerFrame::ResetCanvas,
        opcode::TURN => ServerFrame::Turn {
            index: reader.read_i32().await?,
        },
        opcode::STROKE => ServerFrame::Stroke(Stroke::read(reader).await?),
        opcode::STOP_DRAWING => ServerFrame::StopDrawing,
        opcode::GAME_CHAT => ServerFrame::Broadcast {
            text: read_string(reader).await?,
        },
        opcode::GAME_FINISHED => ServerFrame::GameFinished,
        other => return Err(ProtocolError::UnknownOpcode(other)),
    };
    Ok(frame)
}

/// Number of UTF-16 code units the string occupies on the wire
pub fn wire_len(s: &str) -> usize {
    s.encode_utf16().count()
}

fn put_i32(buf: &mut Vec<u8>, value: i32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    let units: Vec<u16> = s.encode_utf16().collect();
    put_i32(buf, units.len() as i32);
    for unit in units {
        buf.extend_from_slice(&unit.to_be_bytes());
    }
}

async fn read_string<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, ProtocolError> {
    let len = reader.read_i32().await?;
    if !(0..=MAX_STRING_UNITS).contains(&len) {
        return Err(ProtocolError::InvalidStringLength(len));
    }

    let mut raw = vec![0u8; len as usize * 2];
    reader.read_exact(&mut raw).await?;
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    Ok(String::from_utf16_lossy(&units))
}
