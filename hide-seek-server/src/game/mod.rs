//! Game Logic Module
//!
//! Authoritative hide-and-seek state. No I/O happens here; the network
//! layer owns the single [`GameState`] and drives it.
//!
//! ## Module Structure
//!
//! - `role`: Player roles and their sprites
//! - `config`: Action bindings and key snapshots
//! - `position`: Directions, live positions, starting tables
//! - `player`: Sessions and role capabilities
//! - `map`: Wall layouts
//! - `state`: Registration, frames, readiness gate, eviction

pub mod role;
pub mod config;
pub mod position;
pub mod player;
pub mod map;
pub mod state;

// Re-export key types
pub use role::Role;
pub use config::{PlayerConfig, PressedKeys, default_config};
pub use position::{Direction, PositionTracker, StartingPositions};
pub use player::{PlayerId, PlayerSession, PlayerHandle, Pursuer};
pub use map::WorldMap;
pub use state::{GameState, GameSettings, GamePhase, Frame, GameError};
