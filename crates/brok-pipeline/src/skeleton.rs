//! Skeleton point sets: the candidate positions teeth snap to.
//!
//! # Strategy pattern
//!
//! [`SkeletonKind`] selects how candidates are derived, and the
//! [`SkeletonBuilder`] trait keeps the strategies interchangeable:
//!
//! - [`SkeletonKind::Boundary`] uses the dense, unsimplified outer border.
//!   Teeth then land exactly on the cut line.
//! - [`SkeletonKind::MedialAxis`] thins the material mask to one-pixel
//!   lines with Zhang-Suen and uses every surviving pixel centre.
//!
//! Whatever the strategy, the result is a read-only [`SkeletonPointSet`]
//! indexed by an R\*-tree for nearest-neighbour snapping.

use image::GrayImage;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

use crate::contour::PixelFrame;
use crate::types::{BoundingBox, Point};

/// Selects which skeleton strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkeletonKind {
    /// Dense outer border points.
    #[default]
    Boundary,
    /// Zhang-Suen thinning of the material mask.
    MedialAxis,
}

/// Everything a strategy may draw on.
#[derive(Debug, Clone, Copy)]
pub struct SkeletonSource<'a> {
    /// Binary material mask (non-zero = material).
    pub mask: &'a GrayImage,
    /// Unsimplified outer border in inches.
    pub outer_border: &'a [Point],
    /// Pixel-to-inch mapping for the mask.
    pub frame: &'a PixelFrame,
}

/// Trait for skeleton strategies.
pub trait SkeletonBuilder {
    /// Produce candidate points in inches.
    fn build(&self, source: &SkeletonSource<'_>) -> Vec<Point>;
}

impl SkeletonBuilder for SkeletonKind {
    fn build(&self, source: &SkeletonSource<'_>) -> Vec<Point> {
        match *self {
            Self::Boundary => source.outer_border.to_vec(),
            Self::MedialAxis => {
                let thinned = zhang_suen_thin(source.mask);
                thinned
                    .enumerate_pixels()
                    .filter(|(_, _, p)| p.0[0] != 0)
                    .map(|(x, y, _)| {
                        source
                            .frame
                            .to_inches(Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5))
                    })
                    .collect()
            }
        }
    }
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Unordered, read-only candidate set with a spatial index.
#[derive(Debug, Clone)]
pub struct SkeletonPointSet {
    points: Vec<Point>,
    tree: RTree<IndexedPoint>,
}

impl SkeletonPointSet {
    /// Index `points`. Indices into `points` are the stable identity used
    /// for tie-breaking.
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new([p.x, p.y], i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            points,
        }
    }

    /// All points, in insertion order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The point at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if there are no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points inside `bounds` (inclusive).
    #[must_use]
    pub fn count_in(&self, bounds: &BoundingBox) -> usize {
        self.tree.locate_in_envelope(&envelope(bounds)).count()
    }

    /// Index of the point inside `bounds` nearest to `target`.
    ///
    /// Equidistant candidates resolve to the lowest index. `None` when
    /// the box holds no points.
    #[must_use]
    pub fn nearest_in(&self, target: Point, bounds: &BoundingBox) -> Option<usize> {
        let mut inside = self
            .tree
            .nearest_neighbor_iter_with_distance_2(&[target.x, target.y])
            .filter(|(entry, _)| {
                let [x, y] = *entry.geom();
                bounds.contains(Point::new(x, y))
            });

        let (first, best) = inside.next()?;
        let tied = inside
            .take_while(|(_, d)| *d <= best)
            .map(|(entry, _)| entry.data)
            .min()
            .unwrap_or(first.data);
        Some(tied.min(first.data))
    }
}

fn envelope(bounds: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bounds.x_min, bounds.y_min], [bounds.x_max, bounds.y_max])
}

/// Zhang-Suen thinning of a binary mask (non-zero = foreground).
///
/// Repeats two sub-iterations, each deleting boundary pixels that are not
/// needed to keep the shape connected, until nothing changes. Pixels on
/// the image border are treated as having background neighbours outside.
#[must_use = "returns the thinned mask"]
pub fn zhang_suen_thin(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut grid: Vec<bool> = mask.pixels().map(|p| p.0[0] != 0).collect();
    let idx = |x: u32, y: u32| (y * w + x) as usize;

    let mut changed = true;
    let mut to_clear = Vec::new();
    while changed {
        changed = false;
        for step in 0..2 {
            to_clear.clear();
            for y in 0..h {
                for x in 0..w {
                    if !grid[idx(x, y)] {
                        continue;
                    }
                    let n = neighbours(&grid, w, h, x, y);
                    let count = n.iter().filter(|&&v| v).count();
                    if !(2..=6).contains(&count) || transitions(&n) != 1 {
                        continue;
                    }
                    // n = [P2, P3, P4, P5, P6, P7, P8, P9]
                    let (p2, p4, p6, p8) = (n[0], n[2], n[4], n[6]);
                    let keep = if step == 0 {
                        (p2 && p4 && p6) || (p4 && p6 && p8)
                    } else {
                        (p2 && p4 && p8) || (p2 && p6 && p8)
                    };
                    if !keep {
                        to_clear.push(idx(x, y));
                    }
                }
            }
            if !to_clear.is_empty() {
                changed = true;
                for &i in &to_clear {
                    grid[i] = false;
                }
            }
        }
    }

    GrayImage::from_fn(w, h, |x, y| image::Luma([if grid[idx(x, y)] { 255 } else { 0 }]))
}

/// Clockwise 8-neighbourhood starting north: P2..P9.
fn neighbours(grid: &[bool], w: u32, h: u32, x: u32, y: u32) -> [bool; 8] {
    const OFFSETS: [(i64, i64); 8] = [
        (0, -1),
        (1, -1),
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
    ];
    OFFSETS.map(|(dx, dy)| {
        let nx = i64::from(x) + dx;
        let ny = i64::from(y) + dy;
        if nx < 0 || ny < 0 || nx >= i64::from(w) || ny >= i64::from(h) {
            return false;
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let i = (ny as u64 * u64::from(w) + nx as u64) as usize;
        grid[i]
    })
}

/// Number of false-to-true transitions around the closed neighbourhood.
fn transitions(n: &[bool; 8]) -> usize {
    (0..8).filter(|&i| !n[i] && n[(i + 1) % 8]).count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    fn set(points: &[(f64, f64)]) -> SkeletonPointSet {
        SkeletonPointSet::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn default_is_boundary() {
        assert_eq!(SkeletonKind::default(), SkeletonKind::Boundary);
    }

    #[test]
    fn nearest_respects_box() {
        let s = set(&[(0.0, 0.0), (5.0, 5.0), (6.0, 6.0)]);
        let b = BoundingBox::new(4.0, 10.0, 4.0, 10.0);
        // (0, 0) is closest overall but outside the box.
        assert_eq!(s.nearest_in(Point::new(1.0, 1.0), &b), Some(1));
        assert_eq!(s.count_in(&b), 2);
    }

    #[test]
    fn nearest_ties_resolve_to_lowest_index() {
        let s = set(&[(2.0, 0.0), (0.0, 0.0), (1.0, 1.0), (1.0, -1.0)]);
        let b = BoundingBox::new(-5.0, 5.0, -5.0, 5.0);
        // All four are at distance 1 from (1, 0).
        assert_eq!(s.nearest_in(Point::new(1.0, 0.0), &b), Some(0));
    }

    #[test]
    fn box_edges_are_inclusive() {
        let s = set(&[(1.0, 1.0)]);
        let b = BoundingBox::new(1.0, 2.0, 0.0, 1.0);
        assert_eq!(s.nearest_in(Point::new(1.5, 0.5), &b), Some(0));
        assert_eq!(s.count_in(&b), 1);
    }

    #[test]
    fn empty_box_yields_none() {
        let s = set(&[(0.0, 0.0)]);
        let b = BoundingBox::new(1.0, 2.0, 1.0, 2.0);
        assert_eq!(s.nearest_in(Point::new(1.5, 1.5), &b), None);
        assert_eq!(s.count_in(&b), 0);
    }

    #[test]
    fn thinning_bar_leaves_single_line() {
        // 5-pixel-thick horizontal bar.
        let mask = GrayImage::from_fn(30, 11, |x, y| {
            image::Luma([if (3..=26).contains(&x) && (3..=7).contains(&y) { 255 } else { 0 }])
        });
        let thin = zhang_suen_thin(&mask);

        // Every interior column keeps exactly one pixel, on the centre row.
        for x in 8..=21 {
            let rows: Vec<u32> = (0..11).filter(|&y| thin.get_pixel(x, y).0[0] != 0).collect();
            assert_eq!(rows, vec![5], "column {x}");
        }
    }

    #[test]
    fn thinning_preserves_isolated_pixel() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, image::Luma([255]));
        let thin = zhang_suen_thin(&mask);
        assert_eq!(thin.get_pixel(2, 2).0[0], 255);
    }

    #[test]
    fn medial_axis_strategy_maps_to_inches() {
        let mask = GrayImage::from_fn(30, 11, |x, y| {
            image::Luma([if (3..=26).contains(&x) && (3..=7).contains(&y) { 255 } else { 0 }])
        });
        let frame = PixelFrame::fit(
            Dimensions {
                width: 30,
                height: 11,
            },
            3.0,
            Point::new(0.0, 0.0),
        );
        let source = SkeletonSource {
            mask: &mask,
            outer_border: &[],
            frame: &frame,
        };
        let points = SkeletonKind::MedialAxis.build(&source);
        assert!(!points.is_empty());
        // Centre row 5 maps to y = (5.5 - 5.5) * 0.1 = 0.
        assert!(points.iter().any(|p| p.y.abs() < 1e-9));
        assert!(points.iter().all(|p| p.x.abs() <= 1.5 && p.y.abs() <= 0.55));
    }

    #[test]
    fn boundary_strategy_copies_border() {
        let mask = GrayImage::new(1, 1);
        let frame = PixelFrame::fit(
            Dimensions {
                width: 1,
                height: 1,
            },
            1.0,
            Point::new(0.0, 0.0),
        );
        let border = [Point::new(1.0, 2.0), Point::new(3.0, 4.0)];
        let source = SkeletonSource {
            mask: &mask,
            outer_border: &border,
            frame: &frame,
        };
        assert_eq!(SkeletonKind::Boundary.build(&source), border.to_vec());
    }
}
