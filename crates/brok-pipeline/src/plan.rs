//! Feature planning: evenly spaced ideal slots snapped to the skeleton.
//!
//! Each region's travel extent is trimmed by its skips, divided into
//! `N - 1` equal gaps, and each ideal slot on the box centre line is
//! replaced by the nearest skeleton point inside the box.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FeatureSpec;
use crate::error::PlacementError;
use crate::skeleton::SkeletonPointSet;
use crate::types::{Axis, BoundingBox, ContourId, Point};

/// One tooth: where it should be and where it landed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePlacement {
    /// Zero-based slot index along the axis.
    pub slot: usize,
    /// Evenly spaced target position.
    pub ideal: Point,
    /// Snapped skeleton point.
    pub actual: Point,
    /// Euclidean distance from `ideal` to `actual`.
    pub residual: f64,
}

/// Ordered placements for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    /// Region name.
    pub region: String,
    /// Box used for this attempt (possibly widened).
    pub bounds: BoundingBox,
    /// Travel axis.
    pub axis: Axis,
    /// Nominal spacing `S`.
    pub spacing: f64,
    /// Contour receiving the teeth.
    pub target: ContourId,
    /// Placements in slot order.
    pub placements: Vec<FeaturePlacement>,
}

/// Ideal slot positions and nominal spacing for a region.
///
/// For `N > 1` slots sit at `start + span * i / (N - 1)`; a single slot
/// sits at the span midpoint. The cross coordinate is the box centre line.
#[must_use]
pub fn ideal_slots(spec: &FeatureSpec, bounds: &BoundingBox) -> (Vec<Point>, f64) {
    let (lo, hi) = bounds.extent(spec.axis);
    let start = lo + spec.skip_front;
    let end = hi - spec.skip_back;
    let span = end - start;
    let (c_lo, c_hi) = bounds.cross_extent(spec.axis);
    let cross = f64::midpoint(c_lo, c_hi);

    match spec.teeth {
        0 => (Vec::new(), span),
        1 => (vec![spec.axis.point(start + span / 2.0, cross)], span),
        n => {
            #[allow(clippy::cast_precision_loss)]
            let gaps = (n - 1) as f64;
            let slots = (0..n)
                .map(|i| {
                    #[allow(clippy::cast_precision_loss)]
                    let t = i as f64 / gaps;
                    spec.axis.point(span.mul_add(t, start), cross)
                })
                .collect();
            (slots, span / gaps)
        }
    }
}

/// Plan one region against `bounds` (the configured box, or a widened
/// copy on retry).
///
/// # Errors
///
/// Returns [`PlacementError::NoCandidates`] when the box holds no
/// skeleton points, [`PlacementError::TooFewCandidates`] when it holds
/// fewer than the tooth count, and [`PlacementError::DuplicateSnap`] when
/// two slots resolve to the same point.
pub fn plan_region(
    spec: &FeatureSpec,
    bounds: &BoundingBox,
    skeleton: &SkeletonPointSet,
) -> Result<PlacementResult, PlacementError> {
    let (ideals, spacing) = ideal_slots(spec, bounds);
    let mut result = PlacementResult {
        region: spec.name.clone(),
        bounds: *bounds,
        axis: spec.axis,
        spacing,
        target: spec.target,
        placements: Vec::with_capacity(ideals.len()),
    };
    if ideals.is_empty() {
        return Ok(result);
    }

    let available = skeleton.count_in(bounds);
    if available == 0 {
        return Err(PlacementError::NoCandidates {
            region: spec.name.clone(),
        });
    }
    if available < spec.teeth {
        return Err(PlacementError::TooFewCandidates {
            region: spec.name.clone(),
            available,
            requested: spec.teeth,
        });
    }

    let mut taken: Vec<(usize, usize)> = Vec::with_capacity(ideals.len());
    for (slot, ideal) in ideals.into_iter().enumerate() {
        let Some(index) = skeleton.nearest_in(ideal, bounds) else {
            return Err(PlacementError::NoCandidates {
                region: spec.name.clone(),
            });
        };
        let Some(actual) = skeleton.get(index) else {
            return Err(PlacementError::NoCandidates {
                region: spec.name.clone(),
            });
        };
        if let Some(&(first, _)) = taken.iter().find(|(_, i)| *i == index) {
            return Err(PlacementError::DuplicateSnap {
                region: spec.name.clone(),
                first,
                second: slot,
                x: actual.x,
                y: actual.y,
            });
        }
        taken.push((slot, index));

        let residual = ideal.distance(actual);
        debug!(
            region = %spec.name,
            slot,
            ideal_x = ideal.x,
            ideal_y = ideal.y,
            actual_x = actual.x,
            actual_y = actual.y,
            residual,
            "snapped slot"
        );
        result.placements.push(FeaturePlacement {
            slot,
            ideal,
            actual,
            residual,
        });
    }

    Ok(result)
}

/// Plan one region with its configured box.
///
/// # Errors
///
/// See [`plan_region`].
pub fn plan(spec: &FeatureSpec, skeleton: &SkeletonPointSet) -> Result<PlacementResult, PlacementError> {
    plan_region(spec, &spec.bounds, skeleton)
}
