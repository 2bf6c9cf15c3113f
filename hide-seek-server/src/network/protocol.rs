//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON object tagged by its `type` field; every server
//! reply carries the server clock at send time in `time`.

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::game::config::{PlayerConfig, PressedKeys};
use crate::game::role::Role;
use crate::game::state::Frame;

/// Exact text of the unknown-id error. Clients match on it to reset.
pub const UNKNOWN_ID_MESSAGE: &str = "Received message with unknown id. Please reload the page.";

/// Text of the parse error.
pub const PARSE_ERROR_MESSAGE: &str = "Could not parse message.";

/// Server clock in milliseconds since the Unix epoch.
pub fn server_time() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
///
/// Ids travel as raw strings so that malformed ids are reported as unknown
/// rather than as parse failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Register a new session.
    IdRequest,

    /// Report input and ask for a frame.
    UpdateRequest {
        /// Player id.
        id: String,
        /// Full key snapshot.
        #[serde(rename = "pressedKeys", default)]
        pressed_keys: PressedKeys,
    },

    /// Merge a partial configuration.
    SetConfig {
        /// Player id.
        id: String,
        /// Partial action -> key mapping.
        #[serde(default)]
        config: PlayerConfig,
        /// Suppress the acknowledgement.
        #[serde(default)]
        silent: bool,
    },

    /// Declare readiness.
    PlayerReady {
        /// Player id.
        id: String,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Registration result.
    IdFulfill {
        /// Assigned player id.
        id: String,
        /// Assigned role.
        role: Role,
        /// Server time (ms).
        time: i64,
    },

    /// Frame for the requester.
    UpdateFulfill {
        /// Player count and render data.
        data: Frame,
        /// Server time (ms).
        time: i64,
    },

    /// Configuration merged.
    SetConfigAck {
        /// Server time (ms).
        time: i64,
    },

    /// Readiness recorded.
    PlayerReadyAck {
        /// Server time (ms).
        time: i64,
    },

    /// The game is now in progress. Broadcast once.
    GameStart {
        /// Server time (ms).
        time: i64,
    },

    /// Request could not be served. The connection stays open.
    ErrorResponse {
        /// Machine-readable category.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
        /// Server time (ms).
        time: i64,
        /// Offending payload, when it is worth echoing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message was not valid JSON or had the wrong shape.
    ParseError,
    /// Valid JSON with an unrecognised `type`.
    UnknownMessageType,
    /// Referenced id is not registered. Clients should reset.
    UnknownId,
    /// Server-side invariant violated.
    Internal,
}

impl ServerMessage {
    /// Registration reply stamped with the current time.
    pub fn id_fulfill(id: String, role: Role) -> Self {
        Self::IdFulfill { id, role, time: server_time() }
    }

    /// Frame reply stamped with the current time.
    pub fn update_fulfill(data: Frame) -> Self {
        Self::UpdateFulfill { data, time: server_time() }
    }

    /// Game start broadcast stamped with the current time.
    pub fn game_start() -> Self {
        Self::GameStart { time: server_time() }
    }

    /// Error reply stamped with the current time.
    pub fn error(code: ErrorCode, message: impl Into<String>, payload: Option<Value>) -> Self {
        Self::ErrorResponse {
            code,
            message: message.into(),
            time: server_time(),
            payload,
        }
    }

    /// The unknown-id error.
    pub fn unknown_id() -> Self {
        Self::error(ErrorCode::UnknownId, UNKNOWN_ID_MESSAGE, None)
    }

    /// Server time carried by this message.
    pub fn time(&self) -> i64 {
        match self {
            Self::IdFulfill { time, .. }
            | Self::UpdateFulfill { time, .. }
            | Self::SetConfigAck { time }
            | Self::PlayerReadyAck { time }
            | Self::GameStart { time }
            | Self::ErrorResponse { time, .. } => *time,
        }
    }

    /// Check if this is the unknown-id error.
    pub fn is_unknown_id(&self) -> bool {
        matches!(self, Self::ErrorResponse { code: ErrorCode::UnknownId, .. })
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::core::renderable::Renderable;

    #[test]
    fn test_client_message_tags() {
        let msg = ClientMessage::from_json(r#"{"type":"idRequest"}"#).unwrap();
        assert_eq!(msg, ClientMessage::IdRequest);

        let msg = ClientMessage::from_json(
            r#"{"type":"updateRequest","id":"abc","pressedKeys":{"shift":true}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::UpdateRequest {
                id: "abc".into(),
                pressed_keys: PressedKeys::from_pairs([("shift", true)]),
            }
        );
    }

    #[test]
    fn test_set_config_defaults() {
        let msg = ClientMessage::from_json(r#"{"type":"setConfig","id":"abc","config":{"MoveUp":"i"}}"#).unwrap();
        match msg {
            ClientMessage::SetConfig { silent, config, .. } => {
                assert!(!silent);
                assert_eq!(config.key_for("MoveUp"), Some("i"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_id_is_parse_error() {
        assert!(ClientMessage::from_json(r#"{"type":"playerReady"}"#).is_err());
        assert!(ClientMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_server_message_shape() {
        let msg = ServerMessage::UpdateFulfill {
            data: Frame {
                player_count: 2,
                render_data: vec![Renderable::wall(0.0, 0.0, 10.0, 10.0)],
            },
            time: 42,
        };

        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "updateFulfill",
                "data": {
                    "playerCount": 2,
                    "renderData": [{ "type": "DrawableWall", "args": [0.0, 0.0, 10.0, 10.0] }]
                },
                "time": 42
            })
        );
    }

    #[test]
    fn test_error_response_shape() {
        let msg = ServerMessage::ErrorResponse {
            code: ErrorCode::UnknownId,
            message: UNKNOWN_ID_MESSAGE.into(),
            time: 7,
            payload: None,
        };
        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "type": "errorResponse", "code": "unknown_id", "message": UNKNOWN_ID_MESSAGE, "time": 7 })
        );
        assert!(msg.is_unknown_id());
    }

    #[test]
    fn test_replies_carry_time() {
        let before = server_time();
        let msg = ServerMessage::game_start();
        assert!(msg.time() >= before);
        assert_eq!(ServerMessage::from_json(&msg.to_json().unwrap()).unwrap(), msg);
    }
}
