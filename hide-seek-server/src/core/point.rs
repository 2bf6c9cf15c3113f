//! 2D Point
//!
//! Screen-space point used by every geometry query.
//! Y grows downward, matching the drawing surface.

use std::fmt;
use std::ops::{Add, Sub, Neg};
use serde::{Serialize, Deserialize};

/// A point (or vector) in screen space.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal component, grows to the right.
    pub x: f64,
    /// Vertical component, grows downward.
    pub y: f64,
}

impl Point {
    /// Origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new point.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Squared length.
    #[inline]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Rotate 90 degrees (edge normal for polygon tests).
    #[inline]
    pub fn perpendicular(self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }

    /// Approximate equality, for comparing results of trigonometry.
    pub fn approx_eq(self, other: Self, epsilon: f64) -> bool {
        (self.x - other.x).abs() <= epsilon && (self.y - other.y).abs() <= epsilon
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point({:.3}, {:.3})", self.x, self.y)
    }
}

impl Add for Point {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Point {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Neg for Point {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(2.0, 3.0);
        let b = Point::new(4.0, 5.0);
        assert_eq!(a + b, Point::new(6.0, 8.0));
        assert_eq!(b - a, Point::new(2.0, 2.0));
        assert_eq!(-a, Point::new(-2.0, -3.0));
        // 2*4 + 3*5 = 23
        assert_eq!(a.dot(b), 23.0);
    }

    #[test]
    fn test_point_length() {
        // 3-4-5 triangle
        let v = Point::new(3.0, 4.0);
        assert_eq!(v.length_squared(), 25.0);
        assert_eq!(v.length(), 5.0);
        assert_eq!(Point::ZERO.distance(v), 5.0);
    }

    #[test]
    fn test_perpendicular_is_orthogonal() {
        let v = Point::new(7.0, -2.5);
        assert_eq!(v.dot(v.perpendicular()), 0.0);
    }

    #[test]
    fn test_serializes_as_object() {
        let json = serde_json::to_string(&Point::new(1.5, -2.0)).unwrap();
        assert_eq!(json, r#"{"x":1.5,"y":-2.0}"#);
    }
}
