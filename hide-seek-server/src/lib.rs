//! # Hide & Seek Game Server
//!
//! Authoritative state server for a small real-time hide-and-seek game,
//! plus the shape layer shared with clients.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HIDE & SEEK SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Shared shape layer (no I/O)             │
//! │  ├── point.rs      - 2D float point                          │
//! │  ├── geometry.rs   - Triangle test, rotation, SAT            │
//! │  └── renderable.rs - Wall/Sprite/Triangle + wire codec       │
//! │                                                              │
//! │  game/             - Authoritative state                     │
//! │  ├── role.rs       - Pursuer, seekers, spectators            │
//! │  ├── config.rs     - Key bindings and key snapshots          │
//! │  ├── position.rs   - Directions and live positions           │
//! │  ├── player.rs     - Sessions and role capabilities          │
//! │  ├── map.rs        - Wall layouts                            │
//! │  └── state.rs      - Registration, frames, readiness         │
//! │                                                              │
//! │  network/          - WebSocket plumbing                      │
//! │  ├── protocol.rs   - Message types                           │
//! │  ├── handler.rs    - Message routing                         │
//! │  ├── scheduler.rs  - Recurring tasks                         │
//! │  ├── server.rs     - WebSocket server                        │
//! │  └── client.rs     - Headless client                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Visibility Rule
//!
//! Every frame shows the walls and every seeker. The pursuer is drawn only
//! for the pursuer themself, or for everyone while the pursuer holds their
//! sprint key.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::point::Point;
pub use crate::core::renderable::{Renderable, RenderableError};
pub use crate::game::state::{GameState, GamePhase, Frame, GameError};
pub use crate::game::player::PlayerId;
pub use crate::game::role::Role;
pub use crate::network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
