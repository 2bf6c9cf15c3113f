//! WebSocket Game Server
//!
//! Async WebSocket server owning the single game state.
//! Handles connection lifecycle, message routing, the readiness gate and
//! stale-session cleanup.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::map::WorldMap;
use crate::game::player::PlayerId;
use crate::game::state::{GamePhase, GameSettings, GameState};
use crate::network::handler;
use crate::network::protocol::{ErrorCode, ServerMessage, PARSE_ERROR_MESSAGE};
use crate::network::scheduler::{RecurringTask, SchedulerError, TaskControl};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Server configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Period of the readiness check.
    pub ready_check_interval: Duration,
    /// Idle time after which a session is evicted. None disables eviction.
    pub idle_timeout: Option<Duration>,
    /// Period of the eviction sweep.
    pub cleanup_interval: Duration,
    /// Players required before the game can start.
    pub min_players: usize,
    /// Distance moved per pressed direction per input report.
    pub move_step: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let settings = GameSettings::default();
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            ready_check_interval: Duration::from_millis(1000),
            idle_timeout: settings.idle_timeout,
            cleanup_interval: Duration::from_secs(30),
            min_players: settings.min_players,
            move_step: settings.move_step,
        }
    }
}

impl ServerConfig {
    /// Load from `HIDE_SEEK_*` environment variables, defaulting anything unset.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GameServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let min_players = parse_var(&lookup, "HIDE_SEEK_MIN_PLAYERS", defaults.min_players)?;
        if min_players < 2 {
            return Err(invalid("HIDE_SEEK_MIN_PLAYERS", min_players, "a game needs at least 2 players"));
        }
        let move_step: f64 = parse_var(&lookup, "HIDE_SEEK_MOVE_STEP", defaults.move_step)?;
        if !move_step.is_finite() || move_step <= 0.0 {
            return Err(invalid("HIDE_SEEK_MOVE_STEP", move_step, "must be a finite positive distance"));
        }

        let idle_secs = parse_var(
            &lookup,
            "HIDE_SEEK_IDLE_TIMEOUT_SECS",
            defaults.idle_timeout.map_or(0, |d| d.as_secs()),
        )?;

        Ok(Self {
            bind_addr: parse_var(&lookup, "HIDE_SEEK_BIND_ADDR", defaults.bind_addr)?,
            max_connections: parse_var(&lookup, "HIDE_SEEK_MAX_CONNECTIONS", defaults.max_connections)?,
            ready_check_interval: Duration::from_millis(parse_nonzero(
                &lookup,
                "HIDE_SEEK_READY_CHECK_MS",
                defaults.ready_check_interval.as_millis() as u64,
            )?),
            idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
            cleanup_interval: Duration::from_secs(parse_nonzero(
                &lookup,
                "HIDE_SEEK_CLEANUP_INTERVAL_SECS",
                defaults.cleanup_interval.as_secs(),
            )?),
            min_players,
            move_step,
        })
    }

    /// Game-level settings derived from this configuration.
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            min_players: self.min_players,
            move_step: self.move_step,
            idle_timeout: self.idle_timeout,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, GameServerError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| GameServerError::Config {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Parse a period. Zero is rejected since a timer cannot fire every 0 units.
fn parse_nonzero<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, GameServerError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_var(lookup, key, default)?;
    if value == 0 {
        return Err(invalid(key, value, "must be greater than zero"));
    }
    Ok(value)
}

fn invalid<T: Display>(key: &'static str, value: T, reason: &str) -> GameServerError {
    GameServerError::Config {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Configuration value could not be parsed.
    #[error("Invalid {key}={value:?}: {reason}")]
    Config {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// Background task could not be scheduled.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

// =============================================================================
// SERVER
// =============================================================================

/// Connected client state.
struct ConnectedClient {
    /// Player this connection speaks for, once known.
    player_id: Option<PlayerId>,
    /// Connection time.
    connected_at: Instant,
    /// Outbound queue drained by the connection's writer task.
    sender: mpsc::Sender<ServerMessage>,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;
type SharedGame = Arc<RwLock<GameState>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Authoritative game state.
    game: SharedGame,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server on a freshly selected map.
    pub fn new(config: ServerConfig) -> Self {
        let game = GameState::new(WorldMap::random(), config.game_settings());
        Self::with_game(config, game)
    }

    /// Create a server around an existing game state.
    pub fn with_game(config: ServerConfig, game: GameState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            game: Arc::new(RwLock::new(game)),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve an already bound listener until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let local_addr = listener.local_addr()?;
        info!("Game server listening on {} (map {})", local_addr, self.game.read().await.map().name());

        let readiness = self.spawn_readiness_task()?;
        let cleanup = match self.spawn_cleanup_task() {
            Ok(cleanup) => cleanup,
            Err(e) => {
                readiness.cancel();
                return Err(e.into());
            }
        };

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        readiness.cancel();
        if let Some(cleanup) = cleanup {
            cleanup.cancel();
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let game = self.game.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            clients.write().await.insert(addr, ConnectedClient {
                player_id: None,
                connected_at: Instant::now(),
                sender: msg_tx.clone(),
            });

            // Writer
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let reply = {
                                    let mut game = game.write().await;
                                    handler::handle_text(&mut game, &text)
                                };

                                if let Some(player_id) = reply.bound {
                                    Self::bind(&clients, addr, player_id).await;
                                }
                                if let Some(msg) = reply.message {
                                    if msg_tx.send(msg).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                debug!("Binary frame from {}", addr);
                                let reply = ServerMessage::error(ErrorCode::ParseError, PARSE_ERROR_MESSAGE, None);
                                if msg_tx.send(reply).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            sender_task.abort();

            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    "Client {} cleaned up after {:?} (player {})",
                    addr,
                    client.connected_at.elapsed(),
                    client.player_id.map_or_else(|| "none".to_string(), |id| id.short()),
                );
            }
        });
    }

    /// Record which player a connection speaks for.
    async fn bind(clients: &Clients, addr: SocketAddr, player_id: PlayerId) {
        let mut clients = clients.write().await;
        if let Some(client) = clients.get_mut(&addr) {
            if client.player_id != Some(player_id) {
                debug!("Connection {} bound to player {}", addr, player_id.short());
                client.player_id = Some(player_id);
            }
        }
    }

    /// Send `msg` to every connection bound to a player.
    async fn broadcast_bound(clients: &Clients, msg: ServerMessage) -> usize {
        let senders: Vec<_> = clients
            .read()
            .await
            .values()
            .filter(|c| c.player_id.is_some())
            .map(|c| c.sender.clone())
            .collect();

        let mut delivered = 0;
        for sender in senders {
            if sender.send(msg.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Spawn the one-shot readiness gate.
    fn spawn_readiness_task(&self) -> Result<RecurringTask, SchedulerError> {
        let game = self.game.clone();
        let clients = self.clients.clone();

        RecurringTask::spawn("readiness", self.config.ready_check_interval, move || {
            let game = game.clone();
            let clients = clients.clone();
            async move {
                let started = {
                    let mut game = game.write().await;
                    if game.phase() != GamePhase::NotStarted {
                        return TaskControl::Stop;
                    }
                    game.try_start()
                };
                if !started {
                    return TaskControl::Continue;
                }

                let delivered = Self::broadcast_bound(&clients, ServerMessage::game_start()).await;
                info!("Game start sent to {} connections", delivered);
                TaskControl::Stop
            }
        })
    }

    /// Spawn the stale-session sweep, unless eviction is disabled.
    fn spawn_cleanup_task(&self) -> Result<Option<RecurringTask>, SchedulerError> {
        if self.config.idle_timeout.is_none() {
            return Ok(None);
        }
        let game = self.game.clone();
        let clients = self.clients.clone();

        RecurringTask::spawn("cleanup", self.config.cleanup_interval, move || {
            let game = game.clone();
            let clients = clients.clone();
            async move {
                let evicted = game.write().await.evict_idle(Instant::now());
                if !evicted.is_empty() {
                    let mut clients = clients.write().await;
                    for client in clients.values_mut() {
                        if client.player_id.is_some_and(|id| evicted.contains(&id)) {
                            client.player_id = None;
                        }
                    }
                }
                TaskControl::Continue
            }
        })
        .map(Some)
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Shared game state.
    pub fn game(&self) -> SharedGame {
        self.game.clone()
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Get registered player count.
    pub async fn player_count(&self) -> usize {
        self.game.read().await.player_count()
    }

    /// Current game phase.
    pub async fn phase(&self) -> GamePhase {
        self.game.read().await.phase()
    }
}
