//! Per-connection tasks: admission, the read loop and the socket writer

use crate::config::GameConfig;
use crate::game::GameEvent;
use crate::lobby::{Outbound, PlayerId};
use log::{debug, info, warn};
use shared::{read_client_frame, ClientFrame, ProtocolError, ServerFrame};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};

/// Why a session's read loop stopped
#[derive(Debug)]
pub enum SessionEnd {
    /// Client sent an explicit disconnect frame
    Left,
    /// Socket reached EOF or was reset
    Closed,
    /// Nothing arrived within the inactivity timeout
    TimedOut,
    /// Client sent something that is not a valid frame
    Protocol(ProtocolError),
    /// The scheduler is no longer accepting events
    ServerGone,
    /// Client stopped reading and its outbound queue filled up
    Overflowed,
}

/// Drives one connection from admission to removal
///
/// The writer task is started first so the admission answer reaches the
/// socket whether or not the player gets in.
pub async fn run_session<S>(stream: S, events: mpsc::UnboundedSender<GameEvent>, config: GameConfig)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (outbound, outbound_rx) = Outbound::channel();
    let overflow = outbound.overflow_signal();
    let writer_task = tokio::spawn(write_loop(writer, outbound_rx, config.heartbeat_interval));

    let (reply_tx, reply_rx) = oneshot::channel();
    if events
        .send(GameEvent::Connect {
            outbound,
            reply: reply_tx,
        })
        .is_err()
    {
        warn!("Scheduler is gone, dropping new connection");
        return;
    }

    let id = match reply_rx.await {
        Ok(Some(id)) => id,
        _ => {
            debug!("Connection was not admitted");
            return;
        }
    };

    let end = tokio::select! {
        end = read_loop(id, reader, &events, config.inactivity_timeout) => end,
        _ = overflow.notified() => SessionEnd::Overflowed,
    };
    match &end {
        SessionEnd::Left => info!("Player {} disconnected", id),
        SessionEnd::Closed => info!("Player {} closed the connection", id),
        SessionEnd::TimedOut => info!("Player {} timed out", id),
        SessionEnd::Protocol(e) => warn!("Dropping player {}: {}", id, e),
        SessionEnd::ServerGone => debug!("Player {} outlived the scheduler", id),
        SessionEnd::Overflowed => {
            warn!("Dropping player {}: not reading its frames", id);
            // Writer may be parked on a full socket and would never see the queue close
            writer_task.abort();
        }
    }

    let _ = events.send(GameEvent::Disconnect { id });
}

/// Reads client frames until the connection ends for any reason
pub async fn read_loop<R>(
    id: PlayerId,
    mut reader: R,
    events: &mpsc::UnboundedSender<GameEvent>,
    inactivity_timeout: Duration,
) -> SessionEnd
where
    R: AsyncRead + Unpin,
{
    let mut last_activity = Instant::now();

    loop {
        let deadline = last_activity + inactivity_timeout;
        let frame = match timeout_at(deadline, read_client_frame(&mut reader)).await {
            Err(_) => return SessionEnd::TimedOut,
            Ok(Err(e)) if e.is_closed() => return SessionEnd::Closed,
            Ok(Err(e)) => return SessionEnd::Protocol(e),
            Ok(Ok(frame)) => frame,
        };
        last_activity = Instant::now();

        let event = match frame {
            ClientFrame::Heartbeat => continue,
            ClientFrame::Disconnect => return SessionEnd::Left,
            ClientFrame::Join { name } => GameEvent::Join { id, name },
            ClientFrame::LobbyChat { text } => GameEvent::LobbyChat { id, text },
            ClientFrame::GameChat { text } => GameEvent::GameChat { id, text },
            ClientFrame::StartRequest => GameEvent::StartGame { id },
            ClientFrame::Stroke(stroke) => GameEvent::Stroke { id, stroke },
            ClientFrame::StopDrawing => GameEvent::StopDrawing { id },
        };

        if events.send(event).is_err() {
            return SessionEnd::ServerGone;
        }
    }
}

/// Writes queued frames and periodic heartbeat probes
///
/// Runs until every sender for the queue is dropped or a write fails, then
/// shuts the write half down.
pub async fn write_loop<W>(
    mut writer: W,
    mut frames: mpsc::Receiver<ServerFrame>,
    heartbeat_interval: Duration,
) where
    W: AsyncWrite + Unpin,
{
    let mut probe = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => frame.encode(&mut buf),
                None => break,
            },
            _ = probe.tick() => ServerFrame::Heartbeat.encode(&mut buf),
        }

        // Batch whatever else is already queued into the same write
        while let Ok(frame) = frames.try_recv() {
            frame.encode(&mut buf);
        }

        if let Err(e) = writer.write_all(&buf).await {
            debug!("Write failed, stopping writer: {}", e);
            break;
        }
    }

    let _ = writer.shutdown().await;
}
