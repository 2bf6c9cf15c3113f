//! Headless Client
//!
//! Client side of the protocol: the staleness gate for frames, the
//! reconnect-and-reset flow on unknown-id errors, and a thin WebSocket
//! connection speaking JSON.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::game::config::{PlayerConfig, PressedKeys};
use crate::game::role::Role;
use crate::game::state::Frame;
use crate::network::protocol::{ClientMessage, ServerMessage};

// =============================================================================
// FRAME GATE
// =============================================================================

/// Rejects frames older than the newest one applied.
///
/// Replies may arrive out of order; the server's `time` is the only ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameGate {
    last_applied: Option<i64>,
}

impl FrameGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a frame stamped `time`. Equal times are admitted.
    pub fn admit(&mut self, time: i64) -> bool {
        if self.last_applied.is_some_and(|last| time < last) {
            return false;
        }
        self.last_applied = Some(time);
        true
    }

    /// Time of the newest admitted frame.
    pub fn last_applied(&self) -> Option<i64> {
        self.last_applied
    }

    /// Forget everything admitted so far.
    pub fn reset(&mut self) {
        self.last_applied = None;
    }
}

// =============================================================================
// CLIENT SESSION
// =============================================================================

/// Effect of applying one server message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// An id and role were assigned.
    Registered(Role),
    /// A new frame is displayed.
    FrameApplied,
    /// A frame arrived out of order and was dropped.
    FrameDiscarded,
    /// The game started.
    Started,
    /// Configuration or readiness was acknowledged.
    Acknowledged,
    /// The server forgot us; the session was reset and must re-register.
    Reset,
    /// Any other error.
    Error(String),
}

/// Client-side protocol state machine. Performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    id: Option<String>,
    role: Option<Role>,
    gate: FrameGate,
    frame: Option<Frame>,
    started: bool,
}

impl ClientSession {
    /// Create an unregistered session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigned id, once registered.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Assigned role, once registered.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// Frame currently displayed.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Staleness gate.
    pub fn gate(&self) -> &FrameGate {
        &self.gate
    }

    /// Check if the game start was received.
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Next poll: register until an id is known, then report input.
    pub fn next_request(&self, pressed_keys: PressedKeys) -> ClientMessage {
        match &self.id {
            None => ClientMessage::IdRequest,
            Some(id) => ClientMessage::UpdateRequest { id: id.clone(), pressed_keys },
        }
    }

    /// Readiness declaration, once registered.
    pub fn ready_request(&self) -> Option<ClientMessage> {
        self.id.clone().map(|id| ClientMessage::PlayerReady { id })
    }

    /// Configuration update, once registered.
    pub fn config_request(&self, config: PlayerConfig, silent: bool) -> Option<ClientMessage> {
        self.id.clone().map(|id| ClientMessage::SetConfig { id, config, silent })
    }

    /// Apply a server message.
    pub fn apply(&mut self, msg: ServerMessage) -> ClientEvent {
        match msg {
            ServerMessage::IdFulfill { id, role, .. } => {
                self.id = Some(id);
                self.role = Some(role);
                ClientEvent::Registered(role)
            }
            ServerMessage::UpdateFulfill { data, time } => {
                if !self.gate.admit(time) {
                    debug!("Discarded stale frame at {}", time);
                    return ClientEvent::FrameDiscarded;
                }
                self.frame = Some(data);
                ClientEvent::FrameApplied
            }
            ServerMessage::GameStart { .. } => {
                self.started = true;
                ClientEvent::Started
            }
            ServerMessage::SetConfigAck { .. } | ServerMessage::PlayerReadyAck { .. } => ClientEvent::Acknowledged,
            msg @ ServerMessage::ErrorResponse { .. } if msg.is_unknown_id() => {
                warn!("Server does not know us, resetting session");
                *self = Self::new();
                ClientEvent::Reset
            }
            ServerMessage::ErrorResponse { message, .. } => ClientEvent::Error(message),
        }
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Message could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server closed the connection.
    #[error("Connection closed")]
    Closed,
}

/// JSON-over-WebSocket connection to a game server.
pub struct Connection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Connection {
    /// Connect to `url` (e.g. `ws://127.0.0.1:8080`).
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _) = connect_async(url).await?;
        info!("Connected to {}", url);
        Ok(Self { stream })
    }

    /// Send a protocol message.
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        self.send_text(msg.to_json()?).await
    }

    /// Send raw text.
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<(), ClientError> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Receive the next protocol message, skipping control frames.
    pub async fn recv(&mut self) -> Result<ServerMessage, ClientError> {
        while let Some(msg) = self.stream.next().await {
            match msg? {
                Message::Text(text) => return Ok(ServerMessage::from_json(&text)?),
                Message::Close(_) => return Err(ClientError::Closed),
                _ => {}
            }
        }
        Err(ClientError::Closed)
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
