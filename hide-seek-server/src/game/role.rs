//! Player Roles

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::renderable::SpriteAtlas;

/// Image used for the pursuer's sprite.
pub const PURSUER_IMAGE: &str = "pursuer.png";
/// Image used for every seeker's sprite.
pub const SEEKER_IMAGE: &str = "seeker.png";
/// Natural size of both sprite images (width, height).
pub const SPRITE_SIZE: (f64, f64) = (64.0, 64.0);

/// Atlas holding the natural size of every role sprite.
pub fn sprite_atlas() -> SpriteAtlas {
    SpriteAtlas::new()
        .with_image(PURSUER_IMAGE, SPRITE_SIZE.0, SPRITE_SIZE.1)
        .with_image(SEEKER_IMAGE, SPRITE_SIZE.0, SPRITE_SIZE.1)
}

/// Role assigned to a player when they join.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single hidden player.
    Pursuer,
    /// First seeker slot.
    Seeker1,
    /// Second seeker slot.
    Seeker2,
    /// Third seeker slot.
    Seeker3,
    /// Fourth seeker slot.
    Seeker4,
    /// Watches without playing.
    Spectator,
}

impl Role {
    /// Slots filled, in order, by new registrants. Anyone beyond these spectates.
    pub const JOIN_SLOTS: [Role; 2] = [Role::Pursuer, Role::Seeker1];

    /// Seeker slot index (0-based), if this is a seeker role.
    pub fn seeker_slot(self) -> Option<usize> {
        match self {
            Role::Seeker1 => Some(0),
            Role::Seeker2 => Some(1),
            Role::Seeker3 => Some(2),
            Role::Seeker4 => Some(3),
            Role::Pursuer | Role::Spectator => None,
        }
    }

    /// Check if this is one of the seeker roles.
    #[inline]
    pub fn is_seeker(self) -> bool {
        self.seeker_slot().is_some()
    }

    /// Check if this role has a position on the map.
    #[inline]
    pub fn is_playable(self) -> bool {
        self != Role::Spectator
    }

    /// Sprite image for this role, if it is drawn at all.
    pub fn sprite_image(self) -> Option<&'static str> {
        match self {
            Role::Pursuer => Some(PURSUER_IMAGE),
            Role::Spectator => None,
            _ => Some(SEEKER_IMAGE),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Pursuer => "pursuer",
            Role::Seeker1 => "seeker1",
            Role::Seeker2 => "seeker2",
            Role::Seeker3 => "seeker3",
            Role::Seeker4 => "seeker4",
            Role::Spectator => "spectator",
        };
        f.write_str(name)
    }
}
