//! Player Configuration and Input Snapshots
//!
//! A player's configuration maps action names to input keys. Clients may
//! send partial updates that are shallow-merged over the stored mapping.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};

use crate::game::position::Direction;

/// Action: pursuer sprint (makes the pursuer visible to everyone).
pub const ACTION_PURSUER_SPRINT: &str = "PursuerSprint";
/// Action: move up.
pub const ACTION_MOVE_UP: &str = "MoveUp";
/// Action: move down.
pub const ACTION_MOVE_DOWN: &str = "MoveDown";
/// Action: move left.
pub const ACTION_MOVE_LEFT: &str = "MoveLeft";
/// Action: move right.
pub const ACTION_MOVE_RIGHT: &str = "MoveRight";

/// Movement actions and the direction each one moves.
pub const MOVEMENT_ACTIONS: [(&str, Direction); 4] = [
    (ACTION_MOVE_UP, Direction::Up),
    (ACTION_MOVE_DOWN, Direction::Down),
    (ACTION_MOVE_LEFT, Direction::Left),
    (ACTION_MOVE_RIGHT, Direction::Right),
];

/// Action name -> input key mapping.
///
/// Values are arbitrary JSON so that client-side settings survive a
/// round trip; only string values resolve to keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerConfig(Map<String, Value>);

impl PlayerConfig {
    /// Empty configuration (useful as a partial update).
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// Build from key/value pairs.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Overwrite stored entries with every entry of `partial`.
    /// Entries absent from `partial` keep their value.
    pub fn merge(&mut self, partial: PlayerConfig) {
        for (action, value) in partial.0 {
            self.0.insert(action, value);
        }
    }

    /// Raw value stored for `action`.
    pub fn get(&self, action: &str) -> Option<&Value> {
        self.0.get(action)
    }

    /// Input key bound to `action`, if it is bound to a string.
    pub fn key_for(&self, action: &str) -> Option<&str> {
        self.0.get(action).and_then(Value::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Shared default bindings. Each player receives an independent copy.
pub fn default_config() -> PlayerConfig {
    PlayerConfig::from_pairs([
        (ACTION_PURSUER_SPRINT, "shift"),
        (ACTION_MOVE_UP, "w"),
        (ACTION_MOVE_DOWN, "s"),
        (ACTION_MOVE_LEFT, "a"),
        (ACTION_MOVE_RIGHT, "d"),
    ])
}

/// Latest reported key state: key -> pressed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PressedKeys(BTreeMap<String, bool>);

impl PressedKeys {
    /// Build from key/state pairs.
    pub fn from_pairs<K: Into<String>, I: IntoIterator<Item = (K, bool)>>(pairs: I) -> Self {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Check if `key` is currently held. Unknown keys are not pressed.
    pub fn is_pressed(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_is_shallow() {
        let mut config = PlayerConfig::from_pairs([("a", 1), ("b", 2)]);
        config.merge(PlayerConfig::from_pairs([("b", 3)]));
        assert_eq!(config, PlayerConfig::from_pairs([("a", 1), ("b", 3)]));
    }

    #[test]
    fn test_merge_replaces_nested_values_whole() {
        let mut config: PlayerConfig = serde_json::from_value(json!({ "x": { "inner": 1, "keep": 2 } })).unwrap();
        config.merge(serde_json::from_value(json!({ "x": { "inner": 5 } })).unwrap());
        assert_eq!(config.get("x"), Some(&json!({ "inner": 5 })));
    }

    #[test]
    fn test_default_copies_are_independent() {
        let mut first = default_config();
        let second = default_config();
        first.merge(PlayerConfig::from_pairs([(ACTION_PURSUER_SPRINT, "q")]));

        assert_eq!(first.key_for(ACTION_PURSUER_SPRINT), Some("q"));
        assert_eq!(second.key_for(ACTION_PURSUER_SPRINT), Some("shift"));
    }

    #[test]
    fn test_key_for_ignores_non_strings() {
        let config = PlayerConfig::from_pairs([("Action", 7)]);
        assert_eq!(config.key_for("Action"), None);
        assert_eq!(config.key_for("Missing"), None);
    }

    #[test]
    fn test_pressed_keys_from_json() {
        let keys: PressedKeys = serde_json::from_value(json!({ "shift": true, "w": false })).unwrap();
        assert!(keys.is_pressed("shift"));
        assert!(!keys.is_pressed("w"));
        assert!(!keys.is_pressed("x"));
    }
}
