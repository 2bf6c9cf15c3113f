//! Network Layer
//!
//! WebSocket plumbing around the authoritative game state.
//! Nothing here decides game rules; everything routes through `game/`.

pub mod protocol;
pub mod handler;
pub mod scheduler;
pub mod server;
pub mod client;

pub use protocol::{ClientMessage, ServerMessage, ErrorCode, UNKNOWN_ID_MESSAGE};
pub use handler::{handle_text, dispatch, Reply};
pub use scheduler::{RecurringTask, TaskControl};
pub use server::{GameServer, ServerConfig, GameServerError};
pub use client::{ClientSession, ClientEvent, ClientError, Connection, FrameGate};
