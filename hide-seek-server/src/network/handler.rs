//! Message Handler
//!
//! Routes one inbound message to the game state and builds the reply.
//! Every call runs to completion against `&mut GameState`; the caller holds
//! the state lock for its whole duration.

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::game::player::PlayerId;
use crate::game::state::{GameError, GameState};
use crate::network::protocol::{
    ClientMessage, ErrorCode, ServerMessage, PARSE_ERROR_MESSAGE, server_time,
};

/// Message types the server understands.
const KNOWN_TYPES: [&str; 4] = ["idRequest", "updateRequest", "setConfig", "playerReady"];

/// Outcome of handling one message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Message to send back, if any.
    pub message: Option<ServerMessage>,
    /// Player the connection now speaks for.
    pub bound: Option<PlayerId>,
}

impl Reply {
    fn send(message: ServerMessage) -> Self {
        Self { message: Some(message), bound: None }
    }

    fn bound(message: Option<ServerMessage>, id: PlayerId) -> Self {
        Self { message, bound: Some(id) }
    }
}

/// Handle raw text received from a connection.
pub fn handle_text(game: &mut GameState, text: &str) -> Reply {
    match ClientMessage::from_json(text) {
        Ok(msg) => dispatch(game, msg),
        Err(e) => {
            debug!("Rejected message: {}", e);
            Reply::send(classify_failure(text))
        }
    }
}

/// Unknown `type` tags get their payload echoed; anything else is a parse error.
fn classify_failure(text: &str) -> ServerMessage {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return ServerMessage::error(ErrorCode::ParseError, PARSE_ERROR_MESSAGE, None);
    };

    match value.get("type").and_then(Value::as_str) {
        Some(kind) if !KNOWN_TYPES.contains(&kind) => {
            let message = format!("Unknown message type: {kind}");
            ServerMessage::error(ErrorCode::UnknownMessageType, message, Some(value))
        }
        _ => ServerMessage::error(ErrorCode::ParseError, PARSE_ERROR_MESSAGE, None),
    }
}

/// Handle a parsed message.
pub fn dispatch(game: &mut GameState, msg: ClientMessage) -> Reply {
    match msg {
        ClientMessage::IdRequest => {
            let (id, role) = game.register_player();
            Reply::bound(Some(ServerMessage::id_fulfill(id.to_string(), role)), id)
        }

        ClientMessage::UpdateRequest { id, pressed_keys } => {
            let Some(id) = resolve(game, &id) else {
                return Reply::send(ServerMessage::unknown_id());
            };

            let result = game
                .record_input(&id, pressed_keys)
                .and_then(|()| game.compute_frame(&id));

            match result {
                Ok(frame) => Reply::bound(Some(ServerMessage::update_fulfill(frame)), id),
                Err(e) => Reply::bound(Some(game_error_reply(e)), id),
            }
        }

        ClientMessage::SetConfig { id, config, silent } => {
            let Some(id) = resolve(game, &id) else {
                return Reply::send(ServerMessage::unknown_id());
            };

            match game.update_config(&id, config) {
                Ok(()) if silent => Reply::bound(None, id),
                Ok(()) => Reply::bound(Some(ServerMessage::SetConfigAck { time: server_time() }), id),
                Err(e) => Reply::bound(Some(game_error_reply(e)), id),
            }
        }

        ClientMessage::PlayerReady { id } => {
            let Some(id) = resolve(game, &id) else {
                return Reply::send(ServerMessage::unknown_id());
            };

            match game.mark_ready(&id) {
                Ok(()) => Reply::bound(Some(ServerMessage::PlayerReadyAck { time: server_time() }), id),
                Err(e) => Reply::bound(Some(game_error_reply(e)), id),
            }
        }
    }
}

/// Registered id named by `raw`, if any.
fn resolve(game: &GameState, raw: &str) -> Option<PlayerId> {
    let id = PlayerId::parse(raw).filter(|id| game.contains(id));
    if id.is_none() {
        warn!("Message for unknown id {:?}", raw);
    }
    id
}

fn game_error_reply(err: GameError) -> ServerMessage {
    match err {
        GameError::UnknownPlayer(_) => ServerMessage::unknown_id(),
        GameError::NoPursuer(_) | GameError::Render(_) => {
            error!("Game state inconsistency: {}", err);
            ServerMessage::error(ErrorCode::Internal, err.to_string(), None)
        }
    }
}
