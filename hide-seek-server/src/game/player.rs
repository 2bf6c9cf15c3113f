//! Player Sessions
//!
//! Per-connection player record plus read-only role capabilities built
//! on top of it.

use std::fmt;
use std::time::{Duration, Instant};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use crate::game::config::{default_config, PlayerConfig, PressedKeys, ACTION_PURSUER_SPRINT};
use crate::game::role::Role;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (random UUID).
///
/// Implements Ord so sessions can live in a BTreeMap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(Uuid);

impl PlayerId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the hyphenated string form. Returns None for malformed input.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// =============================================================================
// PLAYER SESSION
// =============================================================================

/// Everything the server knows about one registered player.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    /// Stable identity for the connection's lifetime.
    pub id: PlayerId,
    /// Assigned once at registration.
    pub role: Role,
    /// Action -> key bindings, starts as a copy of the defaults.
    pub config: PlayerConfig,
    /// Readiness, only ever goes false -> true.
    pub ready: bool,
    /// Key state from the most recent input report.
    pub pressed_keys: PressedKeys,
    /// Last time this player reported input.
    pub last_seen: Instant,
}

impl PlayerSession {
    /// Create a fresh session with default configuration.
    pub fn new(id: PlayerId, role: Role, now: Instant) -> Self {
        Self {
            id,
            role,
            config: default_config(),
            ready: false,
            pressed_keys: PressedKeys::default(),
            last_seen: now,
        }
    }

    /// Replace the key snapshot and refresh last-seen.
    pub fn record_input(&mut self, pressed_keys: PressedKeys, now: Instant) {
        self.pressed_keys = pressed_keys;
        self.last_seen = now;
    }

    /// Time since this player was last seen.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

// =============================================================================
// ROLE CAPABILITIES
// =============================================================================

/// Read-only view answering input questions for one player.
#[derive(Debug, Clone, Copy)]
pub struct PlayerHandle<'a> {
    session: &'a PlayerSession,
}

impl<'a> PlayerHandle<'a> {
    /// Wrap a session.
    pub fn new(session: &'a PlayerSession) -> Self {
        Self { session }
    }

    /// Check if the key bound to `action` is held in the latest snapshot.
    /// Unbound actions are never pressed.
    pub fn is_pressing(&self, action: &str) -> bool {
        self.session
            .config
            .key_for(action)
            .is_some_and(|key| self.session.pressed_keys.is_pressed(key))
    }
}

/// Pursuer capability.
#[derive(Debug, Clone, Copy)]
pub struct Pursuer<'a> {
    player: PlayerHandle<'a>,
}

impl<'a> Pursuer<'a> {
    /// Wrap the pursuer's session. Returns None for any other role.
    pub fn new(session: &'a PlayerSession) -> Option<Self> {
        (session.role == Role::Pursuer).then(|| Self { player: PlayerHandle::new(session) })
    }

    /// Check if the pursuer is holding their sprint key.
    pub fn is_sprinting(&self) -> bool {
        self.player.is_pressing(ACTION_PURSUER_SPRINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::ACTION_MOVE_UP;

    #[test]
    fn test_player_id_roundtrip() {
        let id = PlayerId::generate();
        assert_eq!(PlayerId::parse(&id.to_string()), Some(id));
        assert_eq!(PlayerId::parse("not-a-uuid"), None);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_player_id_serializes_as_string() {
        let id = PlayerId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_new_session_defaults() {
        let session = PlayerSession::new(PlayerId::generate(), Role::Seeker1, Instant::now());
        assert!(!session.ready);
        assert_eq!(session.config, default_config());
        assert_eq!(session.pressed_keys, PressedKeys::default());
    }

    #[test]
    fn test_is_pressing_uses_bindings() {
        let mut session = PlayerSession::new(PlayerId::generate(), Role::Seeker1, Instant::now());
        session.record_input(PressedKeys::from_pairs([("w", true)]), Instant::now());

        let handle = PlayerHandle::new(&session);
        assert!(handle.is_pressing(ACTION_MOVE_UP));
        assert!(!handle.is_pressing(ACTION_PURSUER_SPRINT));
        assert!(!handle.is_pressing("Unbound"));
    }

    #[test]
    fn test_pursuer_sprint_follows_rebinding() {
        let mut session = PlayerSession::new(PlayerId::generate(), Role::Pursuer, Instant::now());
        session.config.merge(PlayerConfig::from_pairs([(ACTION_PURSUER_SPRINT, "q")]));
        session.record_input(PressedKeys::from_pairs([("shift", true)]), Instant::now());
        assert!(!Pursuer::new(&session).unwrap().is_sprinting());

        session.record_input(PressedKeys::from_pairs([("q", true)]), Instant::now());
        assert!(Pursuer::new(&session).unwrap().is_sprinting());
    }

    #[test]
    fn test_pursuer_capability_requires_role() {
        let session = PlayerSession::new(PlayerId::generate(), Role::Seeker1, Instant::now());
        assert!(Pursuer::new(&session).is_none());
    }
}
