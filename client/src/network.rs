//! Client network layer: admission handshake and background socket tasks

use log::{debug, info, warn};
use shared::{read_server_frame, ClientFrame, ProtocolError, ServerFrame, Stroke};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("server refused the connection")]
    Denied,

    #[error("unexpected frame during admission (opcode {0})")]
    UnexpectedFrame(i8),

    #[error("connection is closed")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A connected, admitted player
///
/// Heartbeats from the server are answered in the background; every other
/// frame is handed out through [`Client::next_frame`].
pub struct Client {
    name: String,
    outgoing: mpsc::UnboundedSender<ClientFrame>,
    incoming: mpsc::UnboundedReceiver<ServerFrame>,
}

impl Client {
    /// Connects, waits for admission and announces `name`
    pub async fn connect(addr: &str, name: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }

        let (mut reader, writer) = stream.into_split();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        Self::spawn_sender(writer, outgoing_rx);

        loop {
            match read_server_frame(&mut reader).await? {
                ServerFrame::Heartbeat => {
                    let _ = outgoing_tx.send(ClientFrame::Heartbeat);
                }
                ServerFrame::JoinAccepted => break,
                ServerFrame::JoinDenied => return Err(ClientError::Denied),
                other => return Err(ClientError::UnexpectedFrame(other.opcode())),
            }
        }
        info!("Admitted to {} as {:?}", addr, name);

        outgoing_tx
            .send(ClientFrame::Join {
                name: name.to_string(),
            })
            .map_err(|_| ClientError::Closed)?;

        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        Self::spawn_receiver(reader, outgoing_tx.clone(), incoming_tx);

        Ok(Client {
            name: name.to_string(),
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }

    /// Spawns task that writes queued frames to the socket
    fn spawn_sender(mut writer: OwnedWriteHalf, mut outgoing: mpsc::UnboundedReceiver<ClientFrame>) {
        tokio::spawn(async move {
            let mut buf = Vec::with_capacity(64);
            while let Some(frame) = outgoing.recv().await {
                buf.clear();
                frame.encode(&mut buf);
                if let Err(e) = writer.write_all(&buf).await {
                    warn!("Failed to send frame: {}", e);
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });
    }

    /// Spawns task that reads server frames and answers heartbeats
    fn spawn_receiver(
        mut reader: OwnedReadHalf,
        outgoing: mpsc::UnboundedSender<ClientFrame>,
        incoming: mpsc::UnboundedSender<ServerFrame>,
    ) {
        tokio::spawn(async move {
            loop {
                let frame = match read_server_frame(&mut reader).await {
                    Ok(frame) => frame,
                    Err(e) if e.is_closed() => {
                        info!("Server closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!("Dropping connection: {}", e);
                        break;
                    }
                };

                if frame == ServerFrame::Heartbeat {
                    if outgoing.send(ClientFrame::Heartbeat).is_err() {
                        break;
                    }
                    continue;
                }

                if incoming.send(frame).is_err() {
                    debug!("Frame receiver dropped");
                    break;
                }
            }
        });
    }

    fn send(&self, frame: ClientFrame) -> Result<(), ClientError> {
        self.outgoing.send(frame).map_err(|_| ClientError::Closed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send_chat(&self, text: &str) -> Result<(), ClientError> {
        self.send(ClientFrame::LobbyChat {
            text: text.to_string(),
        })
    }

    /// Sends in-game chat; a message matching the word counts as a guess
    pub fn send_game_chat(&self, text: &str) -> Result<(), ClientError> {
        self.send(ClientFrame::GameChat {
            text: text.to_string(),
        })
    }

    pub fn request_start(&self) -> Result<(), ClientError> {
        self.send(ClientFrame::StartRequest)
    }

    pub fn send_stroke(&self, stroke: Stroke) -> Result<(), ClientError> {
        self.send(ClientFrame::Stroke(stroke))
    }

    pub fn stop_drawing(&self) -> Result<(), ClientError> {
        self.send(ClientFrame::StopDrawing)
    }

    /// Says goodbye to the server; the socket closes once the server hangs up
    pub fn disconnect(self) -> Result<(), ClientError> {
        self.send(ClientFrame::Disconnect)
    }

    /// Waits for the next non-heartbeat frame, or None once the connection is gone
    pub async fn next_frame(&mut self) -> Option<ServerFrame> {
        self.incoming.recv().await
    }
}
