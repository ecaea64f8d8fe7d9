//! Closed-loop path simplification using the Ramer-Douglas-Peucker
//! algorithm.
//!
//! Border following yields one point per boundary pixel. RDP drops the
//! points within `tolerance` of the chord between their neighbours so
//! the compiled program is a handful of straight cuts per edge instead
//! of a staircase.

use crate::types::Point;

/// Simplify an open polyline.
///
/// Points within `tolerance` of the line between their endpoints are
/// removed. A tolerance of 0.0 preserves all points. Polylines with fewer
/// than 3 points are returned unchanged.
#[must_use = "returns the simplified polyline"]
pub fn simplify(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    collect_kept(points, &kept)
}

/// Simplify a closed loop (last point implicitly joined to the first).
///
/// The loop is split at its first point and the point farthest from it;
/// both halves are simplified independently so the start point and the
/// opposite extreme always survive.
#[must_use = "returns the simplified loop"]
pub fn simplify_closed(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 4 || tolerance <= 0.0 {
        return points.to_vec();
    }

    let origin = points[0];
    let far = points
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|(_, a), (_, b)| origin.distance_squared(**a).total_cmp(&origin.distance_squared(**b)))
        .map_or(points.len() / 2, |(i, _)| i);

    // Walk the loop as an open path that returns to the origin.
    let mut ring: Vec<Point> = points.to_vec();
    ring.push(origin);
    let last = ring.len() - 1;

    let mut kept = vec![false; ring.len()];
    kept[0] = true;
    kept[far] = true;
    rdp_recurse(&ring, 0, far, tolerance, &mut kept);
    rdp_recurse(&ring, far, last, tolerance, &mut kept);
    kept[last] = false;

    collect_kept(&ring, &kept)
}

fn collect_kept(points: &[Point], kept: &[bool]) -> Vec<Point> {
    points
        .iter()
        .zip(kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
