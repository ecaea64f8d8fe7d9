//! Shared geometric types for the brok pipeline.
//!
//! All coordinates are in physical inches in a y-up frame unless a
//! function says otherwise. Pixel coordinates only exist inside the
//! extractor, which converts them on the way out.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hand raster input to
/// the pipeline without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in workspace coordinates (inches, y-up).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position in inches.
    pub x: f64,
    /// Vertical position in inches (up is positive).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Linear interpolation: `self` at `t = 0`, `other` at `t = 1`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            (other.x - self.x).mul_add(t, self.x),
            (other.y - self.y).mul_add(t, self.y),
        )
    }

    /// Translate by `(dx, dy)` scaled by `k`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64, k: f64) -> Self {
        Self::new(dx.mul_add(k, self.x), dy.mul_add(k, self.y))
    }

    /// Whether two points coincide within `eps` on both axes.
    #[must_use]
    pub fn approx_eq(self, other: Self, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
    }
}

/// A travel axis along which features are distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Features march along increasing x.
    #[default]
    X,
    /// Features march along increasing y.
    Y,
}

impl Axis {
    /// The coordinate of `p` along this axis.
    #[must_use]
    pub const fn along(self, p: Point) -> f64 {
        match self {
            Self::X => p.x,
            Self::Y => p.y,
        }
    }

    /// Build a point from an along-axis and a cross-axis coordinate.
    #[must_use]
    pub const fn point(self, along: f64, cross: f64) -> Point {
        match self {
            Self::X => Point::new(along, cross),
            Self::Y => Point::new(cross, along),
        }
    }
}

/// Axis-aligned rectangle in inches. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x_min: f64,
    /// Right edge.
    pub x_max: f64,
    /// Bottom edge.
    pub y_min: f64,
    /// Top edge.
    pub y_max: f64,
}

impl BoundingBox {
    /// Create a box from its four edges.
    #[must_use]
    pub const fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Whether `p` lies inside or on the boundary of the box.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        (self.x_min..=self.x_max).contains(&p.x) && (self.y_min..=self.y_max).contains(&p.y)
    }

    /// The `[min, max]` extent of the box along `axis`.
    #[must_use]
    pub const fn extent(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::X => (self.x_min, self.x_max),
            Axis::Y => (self.y_min, self.y_max),
        }
    }

    /// The `[min, max]` extent of the box across `axis`.
    #[must_use]
    pub const fn cross_extent(&self, axis: Axis) -> (f64, f64) {
        match axis {
            Axis::X => (self.y_min, self.y_max),
            Axis::Y => (self.x_min, self.x_max),
        }
    }

    /// A copy grown by `dx` on the left and right and `dy` on the top
    /// and bottom.
    #[must_use]
    pub fn widened(&self, dx: f64, dy: f64) -> Self {
        Self::new(
            self.x_min - dx,
            self.x_max + dx,
            self.y_min - dy,
            self.y_max + dy,
        )
    }

    /// Whether the box has strictly positive width and height.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.x_min < self.x_max && self.y_min < self.y_max
    }
}

/// Stable identity of a contour within one extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContourId(pub usize);

impl std::fmt::Display for ContourId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether a contour bounds the part or a hole in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContourKind {
    /// The outer boundary of the retained workpiece.
    Outer,
    /// A hole inside the workpiece; its interior is scrap.
    Inner,
}

impl std::fmt::Display for ContourKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outer => f.write_str("outer"),
            Self::Inner => f.write_str("inner"),
        }
    }
}

/// A closed loop of points tagged outer or inner.
///
/// The loop is implicitly closed: the last point connects back to the
/// first. A duplicated closing point is dropped on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    id: ContourId,
    kind: ContourKind,
    points: Vec<Point>,
}

impl Contour {
    /// Create a contour, dropping an explicit closing point if present.
    #[must_use]
    pub fn new(id: ContourId, kind: ContourKind, mut points: Vec<Point>) -> Self {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        Self { id, kind, points }
    }

    /// The contour's identity.
    #[must_use]
    pub const fn id(&self) -> ContourId {
        self.id
    }

    /// Outer or inner.
    #[must_use]
    pub const fn kind(&self) -> ContourKind {
        self.kind
    }

    /// The loop's points, without the closing duplicate.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of distinct points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over the loop's edges as `(start, end)` pairs, including the
    /// closing edge from the last point back to the first.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    /// Total length of the closed loop.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        self.edges().map(|(a, b)| a.distance(b)).sum()
    }

    /// Axis-aligned bounds of the contour, or `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        points_bounds(&self.points)
    }

    pub(crate) fn into_parts(self) -> (ContourId, ContourKind, Vec<Point>) {
        (self.id, self.kind, self.points)
    }
}

/// Axis-aligned bounds of a point slice, or `None` when empty.
#[must_use]
pub fn points_bounds(points: &[Point]) -> Option<BoundingBox> {
    let first = points.first()?;
    let init = BoundingBox::new(first.x, first.x, first.y, first.y);
    Some(points.iter().fold(init, |b, p| {
        BoundingBox::new(
            b.x_min.min(p.x),
            b.x_max.max(p.x),
            b.y_min.min(p.y),
            b.y_max.max(p.y),
        )
    }))
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_lerp_midpoint() {
        let mid = Point::new(0.0, 0.0).lerp(Point::new(2.0, -4.0), 0.5);
        assert!(mid.approx_eq(Point::new(1.0, -2.0), 1e-12));
    }

    #[test]
    fn axis_round_trips_coordinates() {
        let p = Axis::Y.point(3.0, 7.0);
        assert_eq!(p, Point::new(7.0, 3.0));
        assert!((Axis::Y.along(p) - 3.0).abs() < f64::EPSILON);
        assert!((Axis::X.along(p) - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bounding_box_contains_is_inclusive() {
        let b = BoundingBox::new(9.5, 11.5, 8.5, 9.5);
        assert!(b.contains(Point::new(9.5, 8.5)));
        assert!(b.contains(Point::new(11.5, 9.5)));
        assert!(b.contains(Point::new(10.0, 9.0)));
        assert!(!b.contains(Point::new(11.51, 9.0)));
    }

    #[test]
    fn bounding_box_widened() {
        let b = BoundingBox::new(1.0, 2.0, 3.0, 4.0).widened(0.5, 0.25);
        assert_eq!(b, BoundingBox::new(0.5, 2.5, 2.75, 4.25));
    }

    #[test]
    fn malformed_box_detected() {
        assert!(BoundingBox::new(0.0, 1.0, 0.0, 1.0).is_well_formed());
        assert!(!BoundingBox::new(1.0, 1.0, 0.0, 1.0).is_well_formed());
        assert!(!BoundingBox::new(0.0, 1.0, 2.0, 1.0).is_well_formed());
    }

    #[test]
    fn contour_drops_explicit_closing_point() {
        let c = Contour::new(
            ContourId(0),
            ContourKind::Outer,
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 0.0),
            ],
        );
        assert_eq!(c.len(), 3);
        assert_eq!(c.edges().count(), 3);
    }

    #[test]
    fn contour_perimeter_includes_closing_edge() {
        let c = Contour::new(
            ContourId(0),
            ContourKind::Inner,
            vec![
                Point::new(0.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.0, 1.0),
                Point::new(0.0, 1.0),
            ],
        );
        assert!((c.perimeter() - 6.0).abs() < 1e-12);
        assert_eq!(c.bounds(), Some(BoundingBox::new(0.0, 2.0, 0.0, 1.0)));
    }

    #[test]
    fn contour_serde_round_trip() {
        let c = Contour::new(
            ContourId(3),
            ContourKind::Inner,
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
        );
        let json = serde_json::to_string(&c).unwrap();
        let back: Contour = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
