//! Colliders and SAT Intersection
//!
//! Polygon colliders for walls, players, projectiles, blades and coins.
//! Intersection uses the Separating Axis Theorem over edge normals, which is
//! exact for the convex quads (and line-degenerate quads) the game produces.

use crate::core::codec::{ByteReader, ByteWriter, CodecError};
use crate::core::point::Point;

/// What a collider belongs to, as tagged on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColliderKind {
    Wall = 0,
    Projectile = 1,
}

impl ColliderKind {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ColliderKind::Projectile,
            _ => ColliderKind::Wall,
        }
    }
}

/// An ordered sequence of points forming a polygon, plus a type tag.
///
/// Wall colliders are 2-point line segments; SAT treats those as degenerate
/// polygons with a single axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub points: Vec<Point>,
    pub kind: ColliderKind,
}

impl Collider {
    pub fn wall(points: Vec<Point>) -> Self {
        Self {
            points,
            kind: ColliderKind::Wall,
        }
    }

    pub fn polygon(&self) -> &[Point] {
        &self.points
    }

    pub fn encode(&self, w: &mut ByteWriter) {
        w.write_u8(self.points.len() as u8);
        for p in &self.points {
            p.encode(w);
        }
        w.write_u8(self.kind as u8);
    }

    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let count = r.read_u8()?;
        let mut points = Vec::with_capacity(count as usize);
        for _ in 0..count {
            points.push(Point::decode(r)?);
        }
        let kind = ColliderKind::from_u8(r.read_u8()?);
        Ok(Self { points, kind })
    }
}

/// Project a polygon onto an axis, returning the (min, max) interval.
fn project_polygon(axis: Point, polygon: &[Point]) -> (f64, f64) {
    let mut min = polygon[0].x * axis.x + polygon[0].y * axis.y;
    let mut max = min;

    for vertex in polygon {
        let projection = vertex.x * axis.x + vertex.y * axis.y;
        if projection < min {
            min = projection;
        }
        if projection > max {
            max = projection;
        }
    }

    (min, max)
}

/// True when some edge normal of `poly` separates `a` from `b`.
fn separated_by_any_axis(poly: &[Point], a: &[Point], b: &[Point]) -> bool {
    for i in 0..poly.len() {
        let j = (i + 1) % poly.len();
        let edge = Point::new(poly[j].x - poly[i].x, poly[j].y - poly[i].y);
        let axis = Point::new(-edge.y, edge.x).normalized();

        let (min1, max1) = project_polygon(axis, a);
        let (min2, max2) = project_polygon(axis, b);

        if max1 < min2 || max2 < min1 {
            return true;
        }
    }
    false
}

/// SAT intersection test for two convex polygons.
///
/// Polygons are disjoint iff some edge normal of either polygon projects them
/// onto non-overlapping intervals.
pub fn polygons_intersect(a: &[Point], b: &[Point]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    !separated_by_any_axis(a, a, b) && !separated_by_any_axis(b, a, b)
}

/// A rectangle collider with a pivot and an accumulated rotation.
///
/// Axis-aligned at construction; afterwards it only translates rigidly
/// (`change_position`) and rotates about its pivot (`rotate`). No shear,
/// no scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RectCollider {
    corners: [Point; 4],
    pub pivot: Point,
    pub rotation: f64,
}

impl RectCollider {
    /// Square of the given side length centered on (x, y).
    pub fn new_square(x: f64, y: f64, size: f64) -> Self {
        let half = size / 2.0;
        Self {
            corners: [
                Point::new(x - half, y + half),
                Point::new(x + half, y + half),
                Point::new(x + half, y - half),
                Point::new(x - half, y - half),
            ],
            pivot: Point::new(x, y),
            rotation: 0.0,
        }
    }

    /// Thin rectangle extending from (x, y) along +x, pivoting at its end.
    pub fn new_line(x: f64, y: f64, width: f64, height: f64) -> Self {
        let half = height / 2.0;
        Self {
            corners: [
                Point::new(x, y + half),
                Point::new(x + width, y + half),
                Point::new(x + width, y - half),
                Point::new(x, y - half),
            ],
            pivot: Point::new(x, y),
            rotation: 0.0,
        }
    }

    pub fn set_pivot(&mut self, x: f64, y: f64) {
        self.pivot = Point::new(x, y);
    }

    /// Rigid translation moving the pivot to (px, py).
    pub fn change_position(&mut self, px: f64, py: f64) {
        let dx = px - self.pivot.x;
        let dy = py - self.pivot.y;

        for corner in &mut self.corners {
            corner.x += dx;
            corner.y += dy;
        }

        self.pivot = Point::new(px, py);
    }

    /// Rotate every corner about the pivot by `theta` radians.
    /// The accumulated rotation is reduced mod 360.
    pub fn rotate(&mut self, theta: f64) {
        let (sin, cos) = theta.sin_cos();

        for corner in &mut self.corners {
            let x = corner.x - self.pivot.x;
            let y = corner.y - self.pivot.y;
            corner.x = x * cos - y * sin + self.pivot.x;
            corner.y = x * sin + y * cos + self.pivot.y;
        }

        self.rotation = (self.rotation + theta) % 360.0;
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    pub fn intersects(&self, other: &[Point]) -> bool {
        polygons_intersect(&self.corners, other)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn square(x: f64, y: f64, side: f64) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn test_polygons_intersect() {
        assert!(polygons_intersect(&square(0.0, 0.0, 4.0), &square(2.0, 2.0, 4.0)));
        assert!(!polygons_intersect(&square(0.0, 0.0, 2.0), &square(3.0, 3.0, 2.0)));
    }

    #[test]
    fn test_polygon_and_segment() {
        let poly = square(0.0, 0.0, 4.0);

        let crossing = vec![Point::new(2.0, 2.0), Point::new(6.0, 2.0)];
        assert!(polygons_intersect(&poly, &crossing));

        let outside = vec![Point::new(5.0, 5.0), Point::new(7.0, 5.0)];
        assert!(!polygons_intersect(&poly, &outside));
    }

    #[test]
    fn test_segment_and_segment() {
        let a = vec![Point::new(0.0, 0.0), Point::new(4.0, 4.0)];
        let b = vec![Point::new(0.0, 4.0), Point::new(4.0, 0.0)];
        assert!(polygons_intersect(&a, &b));
    }

    #[test]
    fn test_touching_edges_count_as_intersecting() {
        // Shared edge projects to a zero-width overlap on one axis.
        assert!(polygons_intersect(&square(0.0, 0.0, 2.0), &square(2.0, 0.0, 2.0)));
    }

    #[test]
    fn test_rect_change_position() {
        let mut rect = RectCollider::new_square(0.0, 0.0, 2.0);
        rect.change_position(5.0, 5.0);

        assert_eq!(rect.pivot, Point::new(5.0, 5.0));
        assert!(rect.corners()[0].approx_eq(&Point::new(4.0, 6.0), 1e-12));
        assert!(rect.corners()[2].approx_eq(&Point::new(6.0, 4.0), 1e-12));
    }

    #[test]
    fn test_rect_rotation_about_pivot() {
        let mut rect = RectCollider::new_line(0.0, 0.0, 2.0, 0.5);
        rect.rotate(std::f64::consts::FRAC_PI_2);

        // The far edge midpoint swings from (2, 0) to (0, 2).
        let mid = Point::new(
            (rect.corners()[1].x + rect.corners()[2].x) / 2.0,
            (rect.corners()[1].y + rect.corners()[2].y) / 2.0,
        );
        assert!(mid.approx_eq(&Point::new(0.0, 2.0), 1e-9));
        assert!((rect.rotation - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_preserved_across_translation() {
        let mut rect = RectCollider::new_line(0.0, 0.0, 2.0, 0.5);
        rect.rotate(1.0);
        rect.change_position(10.0, -3.0);
        assert!((rect.rotation - 1.0).abs() < 1e-12);

        // Still a rigid body: far edge stays 2 units from the pivot.
        let mid = Point::new(
            (rect.corners()[1].x + rect.corners()[2].x) / 2.0,
            (rect.corners()[1].y + rect.corners()[2].y) / 2.0,
        );
        assert!((rect.pivot.distance(&mid) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_collider_codec_roundtrip() {
        let collider = Collider::wall(vec![Point::new(0.0, 10.0), Point::new(10.0, 10.0)]);
        let mut w = ByteWriter::new();
        collider.encode(&mut w);

        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let decoded = Collider::decode(&mut r).unwrap();
        assert_eq!(collider, decoded);
    }

    prop_compose! {
        // Random convex quad: an axis-aligned rectangle rotated about its center.
        fn convex_quad()(
            cx in -50.0..50.0f64,
            cy in -50.0..50.0f64,
            w in 0.1..10.0f64,
            h in 0.1..10.0f64,
            theta in 0.0..std::f64::consts::TAU,
        ) -> Vec<Point> {
            let mut rect = RectCollider {
                corners: [
                    Point::new(cx - w / 2.0, cy + h / 2.0),
                    Point::new(cx + w / 2.0, cy + h / 2.0),
                    Point::new(cx + w / 2.0, cy - h / 2.0),
                    Point::new(cx - w / 2.0, cy - h / 2.0),
                ],
                pivot: Point::new(cx, cy),
                rotation: 0.0,
            };
            rect.rotate(theta);
            rect.corners().to_vec()
        }
    }

    proptest! {
        #[test]
        fn prop_sat_is_symmetric(a in convex_quad(), b in convex_quad()) {
            prop_assert_eq!(polygons_intersect(&a, &b), polygons_intersect(&b, &a));
        }

        #[test]
        fn prop_polygon_intersects_itself(a in convex_quad()) {
            prop_assert!(polygons_intersect(&a, &a));
        }
    }
}
