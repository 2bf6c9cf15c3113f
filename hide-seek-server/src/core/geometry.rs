//! Geometry Primitives
//!
//! Pure 2D helpers behind visibility and hit-testing:
//! point-in-triangle, rotation projection and convex polygon
//! intersection (separating axis theorem).

use thiserror::Error;

use super::point::Point;

/// Rejected polygon input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// Fewer than three vertices.
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    /// Two consecutive vertices coincide, so the edge has no normal.
    #[error("polygon edge {0} has zero length")]
    ZeroLengthEdge(usize),
}

/// Check if `p` lies strictly inside the triangle `a`, `b`, `c`.
///
/// Works for either winding order. Points exactly on an edge or vertex
/// are reported as outside.
pub fn point_in_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    let area = 0.5 * (-b.y * c.x + a.y * (-b.x + c.x) + a.x * (b.y - c.y) + b.x * c.y);
    let sign = if area < 0.0 { -1.0 } else { 1.0 };
    let s = (a.y * c.x - a.x * c.y + (c.y - a.y) * p.x + (a.x - c.x) * p.y) * sign;
    let t = (a.x * b.y - a.y * b.x + (a.y - b.y) * p.x + (b.x - a.x) * p.y) * sign;

    s > 0.0 && t > 0.0 && s + t < 2.0 * area * sign
}

/// Project from `origin` along `angle_degrees` by `distance`.
#[inline]
pub fn point_from_rotation(origin: Point, angle_degrees: f64, distance: f64) -> Point {
    let theta = angle_degrees.to_radians();
    Point::new(
        origin.x + distance * theta.cos(),
        origin.y + distance * theta.sin(),
    )
}

/// Check if two convex polygons overlap.
///
/// Vertices must be listed in boundary order (either winding).
/// Touching polygons count as intersecting.
pub fn polygons_intersect(a: &[Point], b: &[Point]) -> Result<bool, GeometryError> {
    validate_polygon(a)?;
    validate_polygon(b)?;

    for polygon in [a, b] {
        for i in 0..polygon.len() {
            let start = polygon[i];
            let end = polygon[(i + 1) % polygon.len()];
            let axis = (end - start).perpendicular();

            let (min_a, max_a) = project(a, axis);
            let (min_b, max_b) = project(b, axis);

            if max_a < min_b || max_b < min_a {
                return Ok(false);
            }
        }
    }

    Ok(true)
}

fn validate_polygon(polygon: &[Point]) -> Result<(), GeometryError> {
    if polygon.len() < 3 {
        return Err(GeometryError::TooFewVertices(polygon.len()));
    }
    for i in 0..polygon.len() {
        if polygon[i] == polygon[(i + 1) % polygon.len()] {
            return Err(GeometryError::ZeroLengthEdge(i));
        }
    }
    Ok(())
}

fn project(polygon: &[Point], axis: Point) -> (f64, f64) {
    polygon.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
        let d = p.dot(axis);
        (min.min(d), max.max(d))
    })
}
