//! Server network layer: TCP acceptor and the scheduler event loop

use crate::config::GameConfig;
use crate::game::{GameEvent, Scheduler};
use crate::session::run_session;
use crate::words::WordList;
use crate::ServerError;
use log::{error, info};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Main server coordinating connections and the game
pub struct Server {
    listener: TcpListener,
    scheduler: Scheduler,
    config: GameConfig,

    // Every session holds a clone of the sender; the loop owns the receiver
    events_tx: mpsc::UnboundedSender<GameEvent>,
    events_rx: mpsc::UnboundedReceiver<GameEvent>,
}

impl Server {
    pub async fn bind(addr: &str, config: GameConfig, words: WordList) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Server listening on {}", addr);

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            scheduler: Scheduler::new(config, words),
            config,
            events_tx,
            events_rx,
        })
    }

    /// Address actually bound, useful when binding to port 0
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Spawns task that accepts connections and starts a session for each
    fn spawn_acceptor(listener: TcpListener, events_tx: mpsc::UnboundedSender<GameEvent>, config: GameConfig) {
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!("Connection from {}", addr);
                        if let Err(e) = stream.set_nodelay(true) {
                            error!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }
                        tokio::spawn(run_session(stream, events_tx.clone(), config));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Main server loop: applies session events and drives the round clock
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            mut scheduler,
            config,
            events_tx,
            mut events_rx,
        } = self;

        Self::spawn_acceptor(listener, events_tx, config);

        let mut clock = interval(config.tick_interval);
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = events_rx.recv() => {
                    match event {
                        Some(event) => scheduler.handle_event(event, Instant::now()),
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = clock.tick() => {
                    scheduler.tick(Instant::now());
                },
            }
        }

        Ok(())
    }
}
