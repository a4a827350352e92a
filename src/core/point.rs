//! 2D Points
//!
//! Continuous double-precision coordinates used for every world position.
//! Also doubles as a plain vector where direction math is needed.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::core::codec::{ByteReader, ByteWriter, CodecError};

/// A continuous point in 2D space.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Add another point, treated as a vector.
    #[inline]
    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    /// Reflect this vector across the given normal.
    pub fn reflect(&self, normal: &Point) -> Point {
        let dot = 2.0 * (self.x * normal.x + self.y * normal.y);
        Point::new(self.x - dot * normal.x, self.y - dot * normal.y)
    }

    /// Normalized vector pointing from this point towards `dest`.
    /// Returns the zero vector when both points coincide.
    pub fn direction_to(&self, dest: &Point) -> Point {
        Point::new(dest.x - self.x, dest.y - self.y).normalized()
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// True when the other point lies strictly inside the given radius.
    #[inline]
    pub fn within_distance_of(&self, radius: f64, other: &Point) -> bool {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy < radius * radius
    }

    /// Component-wise equality within a tolerance.
    pub fn approx_eq(&self, other: &Point, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance && (self.y - other.y).abs() <= tolerance
    }

    /// Ray-cast test for membership in an arbitrary polygon.
    pub fn is_in_polygon(&self, poly: &[Point]) -> bool {
        let mut inside = false;
        let mut j = poly.len().wrapping_sub(1);
        for i in 0..poly.len() {
            let (pi, pj) = (poly[i], poly[j]);

            // Crossing test against the edge's y-span, interpolating the
            // x-coordinate of the edge at this point's y.
            let crosses = (pi.y > self.y) != (pj.y > self.y);
            let px = (pj.x - pi.x) * (self.y - pi.y) / (pj.y - pi.y) + pi.x;

            if crosses && self.x < px {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Scale to unit length. The zero vector stays zero.
    pub fn normalized(&self) -> Point {
        let length = (self.x * self.x + self.y * self.y).sqrt();
        if length == 0.0 {
            return Point::ZERO;
        }
        Point::new(self.x / length, self.y / length)
    }

    pub fn encode(&self, w: &mut ByteWriter) {
        w.write_f64(self.x);
        w.write_f64(self.y);
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let x = r.read_f64()?;
        let y = r.read_f64()?;
        Ok(Self { x, y })
    }
}

impl Add for Point {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================
