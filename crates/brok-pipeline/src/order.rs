//! Cut ordering: holes before the outline, holes in travel order.
//!
//! Cutting the outline frees the part from the sheet; anything cut after
//! that risks a shifted part. So every hole goes first, visited with a
//! nearest-neighbour greedy walk on start points, and the outline last.
//! Loops are only reordered, never reversed: their winding is fixed.

use crate::bevel::OrientedContour;
use crate::types::{ContourKind, Point};

/// Order contours for cutting, starting the walk from `origin`.
///
/// Inner contours come first in greedy nearest-start order, then the
/// outer contour(s) in the same greedy order from wherever the last hole
/// ended.
#[must_use = "returns the cut order"]
pub fn order_for_cutting(contours: Vec<OrientedContour>, origin: Point) -> Vec<OrientedContour> {
    let (inner, outer): (Vec<_>, Vec<_>) = contours
        .into_iter()
        .partition(|c| c.kind() == ContourKind::Inner);

    let mut result = Vec::with_capacity(inner.len() + outer.len());
    let mut position = origin;
    for group in [inner, outer] {
        for contour in nearest_neighbor(group, position) {
            if let Some(&start) = contour.points().first() {
                position = start;
            }
            result.push(contour);
        }
    }
    result
}

/// Greedy nearest-neighbour ordering on contour start points.
fn nearest_neighbor(mut pending: Vec<OrientedContour>, from: Point) -> Vec<OrientedContour> {
    let mut result = Vec::with_capacity(pending.len());
    let mut current = from;

    while !pending.is_empty() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (j, candidate) in pending.iter().enumerate() {
            let Some(&start) = candidate.points().first() else {
                continue;
            };
            let dist = current.distance_squared(start);
            if dist < best_dist {
                best_dist = dist;
                best = j;
            }
        }

        let next = pending.swap_remove(best);
        if let Some(&start) = next.points().first() {
            current = start;
        }
        result.push(next);
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bevel::enforce;
    use crate::types::{Contour, ContourId};

    fn square(id: usize, kind: ContourKind, x: f64, y: f64) -> OrientedContour {
        enforce(Contour::new(
            ContourId(id),
            kind,
            vec![
                Point::new(x, y),
                Point::new(x + 1.0, y),
                Point::new(x + 1.0, y + 1.0),
                Point::new(x, y + 1.0),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn holes_before_outline() {
        let contours = vec![
            square(0, ContourKind::Outer, 0.0, 0.0),
            square(1, ContourKind::Inner, 5.0, 5.0),
        ];
        let ordered = order_for_cutting(contours, Point::new(0.0, 0.0));
        let ids: Vec<usize> = ordered.iter().map(|c| c.id().0).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn holes_in_nearest_order() {
        let contours = vec![
            square(0, ContourKind::Outer, 0.0, 0.0),
            square(1, ContourKind::Inner, 9.0, 0.0),
            square(2, ContourKind::Inner, 1.0, 0.0),
            square(3, ContourKind::Inner, 5.0, 0.0),
        ];
        let ordered = order_for_cutting(contours, Point::new(0.0, 0.0));
        let ids: Vec<usize> = ordered.iter().map(|c| c.id().0).collect();
        assert_eq!(ids, vec![2, 3, 1, 0]);
    }

    #[test]
    fn ordering_never_reverses() {
        let contours = vec![
            square(1, ContourKind::Inner, 3.0, 0.0),
            square(2, ContourKind::Inner, 1.0, 0.0),
        ];
        let before: Vec<Vec<Point>> = contours.iter().map(|c| c.points().to_vec()).collect();
        let ordered = order_for_cutting(contours, Point::new(0.0, 0.0));
        assert_eq!(ordered[0].points(), before[1].as_slice());
        assert_eq!(ordered[1].points(), before[0].as_slice());
    }

    #[test]
    fn empty_input() {
        assert!(order_for_cutting(Vec::new(), Point::new(0.0, 0.0)).is_empty());
    }
}
