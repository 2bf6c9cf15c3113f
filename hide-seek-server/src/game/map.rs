//! World Maps
//!
//! Immutable wall layouts plus one starting position per playable role.
//! A single map instance is shared by every frame of every session.

use crate::core::renderable::{ImageSizes, Renderable, RenderableError};
use crate::game::position::{PositionTracker, StartingPositions};

const BASIC_MAP_WIDTH: f64 = 300.0;
const BASIC_WALL_WIDTH: f64 = 30.0;

/// A named, read-only arena.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldMap {
    name: String,
    walls: Vec<Renderable>,
    starting_positions: StartingPositions,
}

impl WorldMap {
    /// Create a map.
    pub fn new(name: impl Into<String>, walls: Vec<Renderable>, starting_positions: StartingPositions) -> Self {
        Self {
            name: name.into(),
            walls,
            starting_positions,
        }
    }

    /// Square arena enclosed by four walls.
    pub fn basic() -> Self {
        let w = BASIC_MAP_WIDTH;
        let t = BASIC_WALL_WIDTH;

        Self::new(
            "Basic",
            vec![
                Renderable::wall(0.0, 0.0, w, t),
                Renderable::wall(w - t, 0.0, t, w),
                Renderable::wall(0.0, 0.0, t, w),
                Renderable::wall(0.0, w - t, w, t),
            ],
            StartingPositions {
                pursuer: PositionTracker::new(150.0, 80.0),
                seekers: [
                    PositionTracker::new(80.0, 220.0),
                    PositionTracker::new(220.0, 220.0),
                    PositionTracker::new(80.0, 150.0),
                    PositionTracker::new(220.0, 150.0),
                ],
            },
        )
    }

    /// Map for a new game.
    ///
    /// Map rotation is unfinished: this always returns [`WorldMap::basic`].
    pub fn random() -> Self {
        Self::basic()
    }

    /// Map name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical walls, in paint order.
    pub fn walls(&self) -> &[Renderable] {
        &self.walls
    }

    /// Starting table.
    pub fn starting_positions(&self) -> &StartingPositions {
        &self.starting_positions
    }

    /// Independent copy of the walls, taken through the wire codec.
    ///
    /// Callers append per-frame sprites to the result; the map itself is
    /// never touched.
    pub fn render_data(&self) -> Result<Vec<Renderable>, RenderableError> {
        self.walls
            .iter()
            .map(|wall| Renderable::decode(&wall.encode()))
            .collect()
    }

    /// Check if `shape` overlaps any wall.
    pub fn blocks(&self, shape: &Renderable, images: &dyn ImageSizes) -> Result<bool, RenderableError> {
        for wall in &self.walls {
            if wall.intersects(shape, images)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Default for WorldMap {
    fn default() -> Self {
        Self::random()
    }
}
