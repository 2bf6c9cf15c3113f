//! Renderable Shapes
//!
//! Closed set of shape descriptions shared by server and client.
//! Each variant can be drawn onto an injected surface, queried for its
//! convex corners, hit-tested, and encoded to the `{type, args}` wire form.
//!
//! List order in a frame is paint order: later entries draw over earlier ones.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use serde_json::Value;
use thiserror::Error;

use super::geometry::{point_from_rotation, point_in_triangle, polygons_intersect, GeometryError};
use super::point::Point;

/// Wire tag for walls.
pub const WALL_TAG: &str = "DrawableWall";
/// Wire tag for sprites.
pub const SPRITE_TAG: &str = "DrawableImage";
/// Wire tag for triangles.
pub const TRIANGLE_TAG: &str = "DrawableTriangle";

/// Fill colour for walls without an explicit colour.
pub const DEFAULT_WALL_COLOR: &str = "#412b0a";
/// Fill colour for triangles without an explicit colour.
pub const DEFAULT_TRIANGLE_COLOR: &str = "#1b1b1b";

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Drawing surface supplied by the client. The core never draws by itself.
pub trait DrawSurface {
    /// Fill an axis-aligned rectangle.
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: &str);
    /// Draw an image centred on `center`, rotated clockwise by `rotation_degrees`.
    fn draw_image(&mut self, image: &str, center: Point, rotation_degrees: f64);
    /// Fill a closed polygon.
    fn fill_polygon(&mut self, points: &[Point], color: &str);
}

/// Lookup of natural image dimensions, needed for sprite hit-boxes.
pub trait ImageSizes {
    /// Width and height of `image`, if known.
    fn natural_size(&self, image: &str) -> Option<(f64, f64)>;
}

/// Fixed table of image dimensions.
#[derive(Debug, Clone, Default)]
pub struct SpriteAtlas {
    sizes: BTreeMap<String, (f64, f64)>,
}

impl SpriteAtlas {
    /// Create an empty atlas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an image size.
    pub fn insert(&mut self, image: impl Into<String>, width: f64, height: f64) {
        self.sizes.insert(image.into(), (width, height));
    }

    /// Builder form of [`SpriteAtlas::insert`].
    pub fn with_image(mut self, image: impl Into<String>, width: f64, height: f64) -> Self {
        self.insert(image, width, height);
        self
    }
}

impl ImageSizes for SpriteAtlas {
    fn natural_size(&self, image: &str) -> Option<(f64, f64)> {
        self.sizes.get(image).copied()
    }
}

// =============================================================================
// VARIANTS
// =============================================================================

/// Axis-aligned rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct Wall {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub w: f64,
    /// Height.
    pub h: f64,
    /// Fill colour, `None` uses [`DEFAULT_WALL_COLOR`].
    pub color: Option<String>,
}

/// Image drawn around a centre point with a rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Image identifier (asset file name).
    pub image: String,
    /// Centre x.
    pub x: f64,
    /// Centre y.
    pub y: f64,
    /// Clockwise rotation in degrees.
    pub rotation: f64,
}

/// Triangle given by explicit vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    /// First vertex.
    pub p1: Point,
    /// Second vertex.
    pub p2: Point,
    /// Third vertex.
    pub p3: Point,
    /// Fill colour, `None` uses [`DEFAULT_TRIANGLE_COLOR`].
    pub color: Option<String>,
}

/// A serializable shape description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRenderable", into = "WireRenderable")]
pub enum Renderable {
    /// Rectangle wall.
    Wall(Wall),
    /// Rotated image.
    Sprite(Sprite),
    /// Filled triangle.
    Triangle(Triangle),
}

/// Renderable decode and query errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderableError {
    /// The `type` tag names no known variant.
    #[error("unknown renderable variant `{0}`")]
    UnknownVariant(String),

    /// Wrong number of positional arguments.
    #[error("{variant} expects {expected} arguments, got {got}")]
    BadArity {
        /// Wire tag.
        variant: &'static str,
        /// Accepted counts.
        expected: &'static str,
        /// Count received.
        got: usize,
    },

    /// A positional argument has the wrong JSON type.
    #[error("{variant} argument {index} must be {expected}")]
    BadArgument {
        /// Wire tag.
        variant: &'static str,
        /// Argument position.
        index: usize,
        /// Expected JSON shape.
        expected: &'static str,
    },

    /// Sprite references an image with no known size.
    #[error("no size known for image `{0}`")]
    UnknownImage(String),

    /// Corner set rejected by the intersection routine.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Wire form: `{"type": <tag>, "args": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRenderable {
    /// Variant tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ordered constructor parameters.
    pub args: Vec<Value>,
}

impl Renderable {
    /// Wall with the default colour.
    pub fn wall(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::Wall(Wall { x, y, w, h, color: None })
    }

    /// Sprite centred on `center`.
    pub fn sprite(image: impl Into<String>, center: Point, rotation: f64) -> Self {
        Self::Sprite(Sprite {
            image: image.into(),
            x: center.x,
            y: center.y,
            rotation,
        })
    }

    /// Triangle with the default colour.
    pub fn triangle(p1: Point, p2: Point, p3: Point) -> Self {
        Self::Triangle(Triangle { p1, p2, p3, color: None })
    }

    /// Wire tag of this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Wall(_) => WALL_TAG,
            Self::Sprite(_) => SPRITE_TAG,
            Self::Triangle(_) => TRIANGLE_TAG,
        }
    }

    /// Draw onto `surface`, one call per renderable.
    pub fn draw(&self, surface: &mut dyn DrawSurface) {
        match self {
            Self::Wall(wall) => {
                let color = wall.color.as_deref().unwrap_or(DEFAULT_WALL_COLOR);
                surface.fill_rect(wall.x, wall.y, wall.w, wall.h, color);
            }
            Self::Sprite(sprite) => {
                surface.draw_image(&sprite.image, Point::new(sprite.x, sprite.y), sprite.rotation);
            }
            Self::Triangle(tri) => {
                let color = tri.color.as_deref().unwrap_or(DEFAULT_TRIANGLE_COLOR);
                surface.fill_polygon(&[tri.p1, tri.p2, tri.p3], color);
            }
        }
    }

    /// Convex hull in boundary order.
    ///
    /// Walls: top-left, top-right, bottom-right, bottom-left.
    /// Sprites: projected from the centre at `rotation - 135`, `- 45`, `+ 45`
    /// and `+ 135` degrees by half the image diagonal.
    pub fn corners(&self, images: &dyn ImageSizes) -> Result<Vec<Point>, RenderableError> {
        match self {
            Self::Wall(wall) => Ok(vec![
                Point::new(wall.x, wall.y),
                Point::new(wall.x + wall.w, wall.y),
                Point::new(wall.x + wall.w, wall.y + wall.h),
                Point::new(wall.x, wall.y + wall.h),
            ]),
            Self::Sprite(sprite) => {
                let (width, height) = images
                    .natural_size(&sprite.image)
                    .ok_or_else(|| RenderableError::UnknownImage(sprite.image.clone()))?;
                let half_diagonal = (width * width + height * height).sqrt() / 2.0;
                let center = Point::new(sprite.x, sprite.y);
                Ok([-135.0, -45.0, 45.0, 135.0]
                    .iter()
                    .map(|offset| point_from_rotation(center, sprite.rotation + offset, half_diagonal))
                    .collect())
            }
            Self::Triangle(tri) => Ok(vec![tri.p1, tri.p2, tri.p3]),
        }
    }

    /// Check if (x, y) lies strictly inside the shape.
    ///
    /// Sprites are split along the diagonal between their first and third
    /// corners; points on that diagonal fall in neither half.
    pub fn point_within(&self, x: f64, y: f64, images: &dyn ImageSizes) -> Result<bool, RenderableError> {
        let p = Point::new(x, y);
        match self {
            Self::Wall(wall) => Ok(x > wall.x && x < wall.x + wall.w && y > wall.y && y < wall.y + wall.h),
            Self::Sprite(_) => {
                let c = self.corners(images)?;
                Ok(point_in_triangle(p, c[0], c[1], c[2]) || point_in_triangle(p, c[0], c[2], c[3]))
            }
            Self::Triangle(tri) => Ok(point_in_triangle(p, tri.p1, tri.p2, tri.p3)),
        }
    }

    /// Check if two shapes overlap (touching counts).
    pub fn intersects(&self, other: &Renderable, images: &dyn ImageSizes) -> Result<bool, RenderableError> {
        let ours = self.corners(images)?;
        let theirs = other.corners(images)?;
        Ok(polygons_intersect(&ours, &theirs)?)
    }

    /// Encode to the wire form.
    pub fn encode(&self) -> WireRenderable {
        let args = match self {
            Self::Wall(wall) => {
                let mut args = vec![
                    Value::from(wall.x),
                    Value::from(wall.y),
                    Value::from(wall.w),
                    Value::from(wall.h),
                ];
                if let Some(color) = &wall.color {
                    args.push(Value::from(color.as_str()));
                }
                args
            }
            Self::Sprite(sprite) => vec![
                Value::from(sprite.image.as_str()),
                Value::from(sprite.x),
                Value::from(sprite.y),
                Value::from(sprite.rotation),
            ],
            Self::Triangle(tri) => {
                let mut args: Vec<Value> = [tri.p1, tri.p2, tri.p3].iter().map(point_value).collect();
                if let Some(color) = &tri.color {
                    args.push(Value::from(color.as_str()));
                }
                args
            }
        };

        WireRenderable {
            kind: self.kind().to_string(),
            args,
        }
    }

    /// Decode from the wire form, validating arity and argument types.
    pub fn decode(wire: &WireRenderable) -> Result<Self, RenderableError> {
        let args = &wire.args;
        match wire.kind.as_str() {
            WALL_TAG => {
                let variant = WALL_TAG;
                check_arity(variant, "4 or 5", args, 4..=5)?;
                Ok(Self::Wall(Wall {
                    x: number(variant, args, 0)?,
                    y: number(variant, args, 1)?,
                    w: number(variant, args, 2)?,
                    h: number(variant, args, 3)?,
                    color: optional_string(variant, args, 4)?,
                }))
            }
            SPRITE_TAG => {
                let variant = SPRITE_TAG;
                check_arity(variant, "3 or 4", args, 3..=4)?;
                let image = args[0]
                    .as_str()
                    .ok_or(RenderableError::BadArgument { variant, index: 0, expected: "a string" })?;
                // Missing or null rotation means unrotated.
                let rotation = match args.get(3) {
                    None | Some(Value::Null) => 0.0,
                    Some(_) => number(variant, args, 3)?,
                };
                Ok(Self::Sprite(Sprite {
                    image: image.to_string(),
                    x: number(variant, args, 1)?,
                    y: number(variant, args, 2)?,
                    rotation,
                }))
            }
            TRIANGLE_TAG => {
                let variant = TRIANGLE_TAG;
                check_arity(variant, "3 or 4", args, 3..=4)?;
                Ok(Self::Triangle(Triangle {
                    p1: point(variant, args, 0)?,
                    p2: point(variant, args, 1)?,
                    p3: point(variant, args, 2)?,
                    color: optional_string(variant, args, 3)?,
                }))
            }
            other => Err(RenderableError::UnknownVariant(other.to_string())),
        }
    }

    /// Decode from an arbitrary JSON value.
    pub fn from_value(value: Value) -> Result<Self, RenderableError> {
        let wire: WireRenderable = serde_json::from_value(value).map_err(|_| RenderableError::BadArgument {
            variant: "renderable",
            index: 0,
            expected: "an object with `type` and `args`",
        })?;
        Self::decode(&wire)
    }
}

impl TryFrom<WireRenderable> for Renderable {
    type Error = RenderableError;

    fn try_from(wire: WireRenderable) -> Result<Self, Self::Error> {
        Self::decode(&wire)
    }
}

impl From<Renderable> for WireRenderable {
    fn from(renderable: Renderable) -> Self {
        renderable.encode()
    }
}

fn check_arity(
    variant: &'static str,
    expected: &'static str,
    args: &[Value],
    range: std::ops::RangeInclusive<usize>,
) -> Result<(), RenderableError> {
    if range.contains(&args.len()) {
        Ok(())
    } else {
        Err(RenderableError::BadArity { variant, expected, got: args.len() })
    }
}

fn number(variant: &'static str, args: &[Value], index: usize) -> Result<f64, RenderableError> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or(RenderableError::BadArgument { variant, index, expected: "a number" })
}

fn optional_string(variant: &'static str, args: &[Value], index: usize) -> Result<Option<String>, RenderableError> {
    match args.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RenderableError::BadArgument { variant, index, expected: "a string" }),
    }
}

fn point(variant: &'static str, args: &[Value], index: usize) -> Result<Point, RenderableError> {
    args.get(index)
        .and_then(|v| serde_json::from_value::<Point>(v.clone()).ok())
        .ok_or(RenderableError::BadArgument { variant, index, expected: "an {x, y} point" })
}

fn point_value(p: &Point) -> Value {
    serde_json::json!({ "x": p.x, "y": p.y })
}
