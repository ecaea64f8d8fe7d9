//! Cut direction enforcement.
//!
//! A plasma arc leaves a bevel on the left of travel and a square edge on
//! the right. Keeping the part on the right means outer boundaries run
//! clockwise and holes run counter-clockwise (y-up frame). The enforcer
//! reverses any loop whose shoelace sign disagrees with its tag and hands
//! back an [`OrientedContour`], the only input the compiler accepts.

use geo::{Area, LineString, Polygon};
use serde::Serialize;
use tracing::debug;

use crate::error::GeometryError;
use crate::types::{Contour, ContourId, ContourKind, Point};

/// Travel direction around a closed loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Winding {
    /// Clockwise (negative signed area).
    Cw,
    /// Counter-clockwise (positive signed area).
    Ccw,
}

impl Winding {
    /// The winding that keeps the part on the square side of the kerf.
    #[must_use]
    pub const fn required_for(kind: ContourKind) -> Self {
        match kind {
            ContourKind::Outer => Self::Cw,
            ContourKind::Inner => Self::Ccw,
        }
    }
}

impl std::fmt::Display for Winding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cw => f.write_str("CW"),
            Self::Ccw => f.write_str("CCW"),
        }
    }
}

/// A contour whose winding has been fixed.
///
/// Constructed only by [`enforce`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrientedContour {
    id: ContourId,
    kind: ContourKind,
    winding: Winding,
    points: Vec<Point>,
    reversed: bool,
}

impl OrientedContour {
    /// Source contour identity.
    #[must_use]
    pub const fn id(&self) -> ContourId {
        self.id
    }

    /// Outer or inner.
    #[must_use]
    pub const fn kind(&self) -> ContourKind {
        self.kind
    }

    /// Enforced winding.
    #[must_use]
    pub const fn winding(&self) -> Winding {
        self.winding
    }

    /// Points in cutting order, start first, no closing duplicate.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Whether the source order had to be reversed.
    #[must_use]
    pub const fn was_reversed(&self) -> bool {
        self.reversed
    }

    /// Shoelace area in the cutting order.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.points)
    }

    /// Return the plain contour, keeping the enforced order.
    #[must_use]
    pub fn to_contour(&self) -> Contour {
        Contour::new(self.id, self.kind, self.points.clone())
    }
}

/// Shoelace signed area of an implicitly closed loop; positive when
/// counter-clockwise in a y-up frame.
#[must_use]
pub fn signed_area(points: &[Point]) -> f64 {
    let ring: LineString<f64> = points.iter().map(|p| (p.x, p.y)).collect();
    Polygon::new(ring, vec![]).signed_area()
}

/// Fix the winding of `contour` according to its kind.
///
/// Reversal keeps the start point first: `[p0, p1, .., pn]` becomes
/// `[p0, pn, .., p1]`. Already-correct loops pass through unchanged, so
/// enforcing twice is the same as enforcing once.
///
/// # Errors
///
/// Returns [`GeometryError::ZeroArea`] when the loop encloses no area and
/// therefore has no winding.
pub fn enforce(contour: Contour) -> Result<OrientedContour, GeometryError> {
    let area = signed_area(contour.points());
    let (id, kind, mut points) = contour.into_parts();
    if area.abs() <= f64::EPSILON || !area.is_finite() {
        return Err(GeometryError::ZeroArea { id });
    }

    let current = if area > 0.0 { Winding::Ccw } else { Winding::Cw };
    let winding = Winding::required_for(kind);
    let reversed = current != winding;
    if reversed {
        points[1..].reverse();
        debug!(contour = %id, %kind, from = %current, to = %winding, "reversed contour");
    }

    Ok(OrientedContour {
        id,
        kind,
        winding,
        points,
        reversed,
    })
}

/// Enforce every contour, stopping at the first failure.
///
/// # Errors
///
/// See [`enforce`].
pub fn enforce_all(
    contours: impl IntoIterator<Item = Contour>,
) -> Result<Vec<OrientedContour>, GeometryError> {
    contours.into_iter().map(enforce).collect()
}
