//! Shared shape layer.
//!
//! Geometry and renderable descriptions used by both server and client.
//! Nothing in this module performs I/O.

pub mod point;
pub mod geometry;
pub mod renderable;

// Re-export core types
pub use point::Point;
pub use geometry::{point_in_triangle, point_from_rotation, polygons_intersect, GeometryError};
pub use renderable::{
    Renderable, RenderableError, WireRenderable, Wall, Sprite, Triangle,
    DrawSurface, ImageSizes, SpriteAtlas,
};
