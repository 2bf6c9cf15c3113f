//! Position Tracking
//!
//! Mutable screen-space positions and the per-role starting table.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::point::Point;
use crate::game::role::Role;

/// Movement direction. Y grows downward, so `Up` decreases y.
///
/// The server derives directions from key bindings and never reads them
/// off the wire itself. `TryFrom<u8>` (codes in [`Direction::ALL`] order)
/// and `FromStr` (case-insensitive names) are the decoding surface for
/// external callers, such as clients or tools that send directions as
/// codes or names. Both reject anything else with
/// [`PositionError::InvalidDirection`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards smaller y.
    Up,
    /// Towards larger y.
    Down,
    /// Towards smaller x.
    Left,
    /// Towards larger x.
    Right,
}

impl Direction {
    /// All directions, in wire-code order.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];
}

/// Position errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    /// Not one of up/down/left/right.
    #[error("invalid direction `{0}`")]
    InvalidDirection(String),
}

/// Decode a wire code: 0 up, 1 down, 2 left, 3 right.
impl TryFrom<u8> for Direction {
    type Error = PositionError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| PositionError::InvalidDirection(code.to_string()))
    }
}

/// Decode a direction name, ignoring case.
impl FromStr for Direction {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            _ => Err(PositionError::InvalidDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        };
        f.write_str(name)
    }
}

/// A mutable (x, y) position.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionTracker {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl PositionTracker {
    /// Create a tracker at (x, y).
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Move `distance` units along `direction`.
    pub fn move_by(&mut self, direction: Direction, distance: f64) {
        match direction {
            Direction::Up => self.y -= distance,
            Direction::Down => self.y += distance,
            Direction::Left => self.x -= distance,
            Direction::Right => self.x += distance,
        }
    }

    /// Current position as a point.
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Initial position for every playable role.
#[derive(Clone, Debug, PartialEq)]
pub struct StartingPositions {
    /// Pursuer start.
    pub pursuer: PositionTracker,
    /// Seeker starts, indexed by seeker slot (0 = seeker 1).
    pub seekers: [PositionTracker; 4],
}

impl StartingPositions {
    /// Starting position for `role`. Spectators have none.
    pub fn for_role(&self, role: Role) -> Option<PositionTracker> {
        match role {
            Role::Pursuer => Some(self.pursuer),
            Role::Spectator => None,
            seeker => seeker.seeker_slot().map(|slot| self.seekers[slot]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_each_direction() {
        let mut pos = PositionTracker::new(10.0, 10.0);

        pos.move_by(Direction::Up, 3.0);
        assert_eq!(pos, PositionTracker::new(10.0, 7.0));

        pos.move_by(Direction::Down, 5.0);
        assert_eq!(pos, PositionTracker::new(10.0, 12.0));

        pos.move_by(Direction::Left, 4.0);
        assert_eq!(pos, PositionTracker::new(6.0, 12.0));

        pos.move_by(Direction::Right, 1.5);
        assert_eq!(pos, PositionTracker::new(7.5, 12.0));
    }

    #[test]
    fn test_direction_codes() {
        assert_eq!(Direction::try_from(0u8), Ok(Direction::Up));
        assert_eq!(Direction::try_from(3u8), Ok(Direction::Right));
        assert_eq!(
            Direction::try_from(4u8),
            Err(PositionError::InvalidDirection("4".into()))
        );
    }

    #[test]
    fn test_direction_names() {
        assert_eq!("LEFT".parse::<Direction>(), Ok(Direction::Left));
        assert!(matches!(
            "diagonal".parse::<Direction>(),
            Err(PositionError::InvalidDirection(_))
        ));
        for dir in Direction::ALL {
            assert_eq!(dir.to_string().parse::<Direction>(), Ok(dir));
        }
    }

    #[test]
    fn test_starting_positions_lookup() {
        let starts = StartingPositions {
            pursuer: PositionTracker::new(1.0, 1.0),
            seekers: [
                PositionTracker::new(2.0, 2.0),
                PositionTracker::new(3.0, 3.0),
                PositionTracker::new(4.0, 4.0),
                PositionTracker::new(5.0, 5.0),
            ],
        };

        assert_eq!(starts.for_role(Role::Pursuer), Some(PositionTracker::new(1.0, 1.0)));
        assert_eq!(starts.for_role(Role::Seeker3), Some(PositionTracker::new(4.0, 4.0)));
        assert_eq!(starts.for_role(Role::Spectator), None);
    }
}
