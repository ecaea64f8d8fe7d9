//! Skeleton/contour extraction: raster in, tagged loops and candidate
//! points out.
//!
//! Steps: optional blur, threshold, optional close, border following,
//! outer/hole selection, pixel-to-inch mapping, RDP, validity checks and
//! finally the skeleton strategy.

use geo::{Intersects, Line};
use image::GrayImage;
use tracing::{debug, info};

use crate::blur;
use crate::config::ExtractionConfig;
use crate::contour::{self, BorderRole, PixelFrame, TracedBorder};
use crate::error::ExtractionError;
use crate::grayscale;
use crate::simplify;
use crate::skeleton::{SkeletonBuilder, SkeletonPointSet, SkeletonSource};
use crate::types::{Contour, ContourId, ContourKind, Dimensions, Point, points_bounds};

/// Output of the extractor.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The retained workpiece's boundary. Always `ContourId(0)`.
    pub outer: Contour,
    /// Holes in the workpiece, numbered from `ContourId(1)`.
    pub inners: Vec<Contour>,
    /// Snap candidates.
    pub skeleton: SkeletonPointSet,
    /// Mapping used for every coordinate above.
    pub frame: PixelFrame,
}

impl Extraction {
    /// Outer first, then holes.
    pub fn contours(&self) -> impl Iterator<Item = &Contour> {
        std::iter::once(&self.outer).chain(&self.inners)
    }

    /// Look up a contour by id.
    #[must_use]
    pub fn contour(&self, id: ContourId) -> Option<&Contour> {
        self.contours().find(|c| c.id() == id)
    }

    /// Source image size.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.frame.dimensions
    }
}

/// Run extraction on a grayscale image.
///
/// # Errors
///
/// Returns [`ExtractionError::EmptyImage`] for a zero-sized image,
/// [`ExtractionError::NoOuterContour`] when nothing qualifies as the
/// outline, [`ExtractionError::Degenerate`] or
/// [`ExtractionError::SelfIntersecting`] for a kept loop that is unusable
/// after simplification, and [`ExtractionError::EmptySkeleton`] when the
/// strategy yields no points.
pub fn extract(gray: &GrayImage, config: &ExtractionConfig) -> Result<Extraction, ExtractionError> {
    let dimensions = Dimensions {
        width: gray.width(),
        height: gray.height(),
    };
    if dimensions.width == 0 || dimensions.height == 0 {
        return Err(ExtractionError::EmptyImage);
    }

    let blurred = blur::gaussian_blur(gray, config.blur_sigma);
    let mask = grayscale::threshold_mask(&blurred, config.threshold, config.invert);
    let mask = grayscale::close_gaps(&mask, config.close_radius);

    let borders = contour::trace_borders(&mask);
    debug!(borders = borders.len(), "traced borders");

    let outer_idx =
        select_outer(&borders, config.max_outer_circularity).ok_or(ExtractionError::NoOuterContour)?;
    let frame = PixelFrame::fit(dimensions, config.fit_size, config.center);

    let outer_border: Vec<Point> = borders[outer_idx]
        .points
        .iter()
        .map(|&p| frame.to_inches(p))
        .collect();
    let outer = finish_contour(
        ContourId(0),
        ContourKind::Outer,
        &outer_border,
        config.simplify_tolerance,
    )?;

    let mut inners = Vec::new();
    for (i, border) in borders.iter().enumerate() {
        if border.role != BorderRole::Hole || border.parent != Some(outer_idx) {
            continue;
        }
        let area = border.area() * frame.area_scale();
        if area < config.min_hole_area {
            debug!(border = i, area, "dropping speck hole");
            continue;
        }
        let points: Vec<Point> = border.points.iter().map(|&p| frame.to_inches(p)).collect();
        if let Some(limit) = config.max_hole_extent
            && let Some(b) = points_bounds(&points)
            && (b.x_max - b.x_min > limit || b.y_max - b.y_min > limit)
        {
            debug!(border = i, limit, "dropping oversized hole");
            continue;
        }
        let id = ContourId(inners.len() + 1);
        inners.push(finish_contour(
            id,
            ContourKind::Inner,
            &points,
            config.simplify_tolerance,
        )?);
    }

    let source = SkeletonSource {
        mask: &mask,
        outer_border: &outer_border,
        frame: &frame,
    };
    let skeleton = SkeletonPointSet::new(config.skeleton.build(&source));
    if skeleton.is_empty() {
        return Err(ExtractionError::EmptySkeleton);
    }

    info!(
        outer_points = outer.len(),
        holes = inners.len(),
        skeleton = skeleton.len(),
        "extraction complete"
    );

    Ok(Extraction {
        outer,
        inners,
        skeleton,
        frame,
    })
}

/// Index of the largest top-level outline, skipping near-circles when a
/// circularity cap is configured.
fn select_outer(borders: &[TracedBorder], max_circularity: Option<f64>) -> Option<usize> {
    borders
        .iter()
        .enumerate()
        .filter(|(_, b)| b.role == BorderRole::Outline && b.parent.is_none())
        .filter(|(_, b)| b.points.len() >= 3)
        .filter(|(i, b)| {
            let eligible = max_circularity.is_none_or(|cap| b.circularity() < cap);
            if !eligible {
                debug!(border = i, circularity = b.circularity(), "skipping ring-like outline");
            }
            eligible
        })
        .max_by(|(_, a), (_, b)| a.area().total_cmp(&b.area()))
        .map(|(i, _)| i)
}

fn finish_contour(
    id: ContourId,
    kind: ContourKind,
    points: &[Point],
    tolerance: f64,
) -> Result<Contour, ExtractionError> {
    let simplified = simplify::simplify_closed(points, tolerance);
    let contour = Contour::new(id, kind, simplified);
    if contour.len() < 3 {
        return Err(ExtractionError::Degenerate {
            id,
            points: contour.len(),
        });
    }
    if let Some((first, second)) = find_self_intersection(contour.points()) {
        return Err(ExtractionError::SelfIntersecting { id, first, second });
    }
    Ok(contour)
}

/// First pair of non-adjacent edges that touch or cross, if any.
#[must_use]
pub fn find_self_intersection(points: &[Point]) -> Option<(usize, usize)> {
    let n = points.len();
    if n < 4 {
        return None;
    }
    let edge = |i: usize| {
        let a = points[i];
        let b = points[(i + 1) % n];
        Line::new(geo::coord! { x: a.x, y: a.y }, geo::coord! { x: b.x, y: b.y })
    };
    for i in 0..n {
        let ei = edge(i);
        for j in (i + 2)..n {
            // The last edge shares a vertex with the first.
            if i == 0 && j == n - 1 {
                continue;
            }
            if ei.intersects(&edge(j)) {
                return Some((i, j));
            }
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::skeleton::SkeletonKind;

    /// 400x400 white canvas with a black square ring: material from
    /// pixel 40 to 359, white hole from 150 to 249.
    fn plate_with_hole() -> GrayImage {
        GrayImage::from_fn(400, 400, |x, y| {
            let in_outer = (40..360).contains(&x) && (40..360).contains(&y);
            let in_hole = (150..250).contains(&x) && (150..250).contains(&y);
            image::Luma([if in_outer && !in_hole { 0 } else { 255 }])
        })
    }

    #[test]
    fn extracts_outer_and_hole() {
        let gray = plate_with_hole();
        let result = extract(&gray, &ExtractionConfig::default()).unwrap();

        assert_eq!(result.outer.id(), ContourId(0));
        assert_eq!(result.outer.kind(), ContourKind::Outer);
        assert_eq!(result.inners.len(), 1);
        assert_eq!(result.inners[0].id(), ContourId(1));
        assert_eq!(result.inners[0].kind(), ContourKind::Inner);

        // A square outline simplifies to its four corners; the hole
        // border may keep one-pixel chamfers at its corners.
        assert_eq!(result.outer.len(), 4);
        assert!((4..=8).contains(&result.inners[0].len()));

        let b = result.outer.bounds().unwrap();
        let s = 11.5 / 400.0;
        assert!((b.x_min - (1.0 + 40.5 * s)).abs() < 1e-9);
        assert!((b.y_max - (12.5 - 40.5 * s)).abs() < 1e-9);
    }

    #[test]
    fn boundary_skeleton_is_dense() {
        let gray = plate_with_hole();
        let result = extract(&gray, &ExtractionConfig::default()).unwrap();
        // Every border pixel of the 320 px square survives.
        assert_eq!(result.skeleton.len(), 4 * 319);
    }

    #[test]
    fn medial_axis_skeleton_is_inside_outer() {
        let gray = plate_with_hole();
        let config = ExtractionConfig {
            skeleton: SkeletonKind::MedialAxis,
            ..ExtractionConfig::default()
        };
        let result = extract(&gray, &config).unwrap();
        let b = result.outer.bounds().unwrap();
        assert!(!result.skeleton.is_empty());
        assert!(result.skeleton.points().iter().all(|p| b.contains(*p)));
    }

    #[test]
    fn blank_image_has_no_outer() {
        let gray = GrayImage::from_pixel(50, 50, image::Luma([255]));
        assert!(matches!(
            extract(&gray, &ExtractionConfig::default()),
            Err(ExtractionError::NoOuterContour)
        ));
    }

    #[test]
    fn zero_sized_image_rejected() {
        let gray = GrayImage::new(0, 0);
        assert!(matches!(
            extract(&gray, &ExtractionConfig::default()),
            Err(ExtractionError::EmptyImage)
        ));
    }

    #[test]
    fn invert_traces_light_material() {
        let gray = GrayImage::from_fn(100, 100, |x, y| {
            image::Luma([if (20..80).contains(&x) && (20..80).contains(&y) { 255 } else { 0 }])
        });
        let config = ExtractionConfig {
            invert: true,
            ..ExtractionConfig::default()
        };
        let result = extract(&gray, &config).unwrap();
        assert!(result.inners.is_empty());
        assert_eq!(result.outer.len(), 4);
    }

    #[test]
    fn speck_holes_dropped() {
        let gray = GrayImage::from_fn(400, 400, |x, y| {
            let in_outer = (40..360).contains(&x) && (40..360).contains(&y);
            let speck = x == 200 && y == 200;
            image::Luma([if in_outer && !speck { 0 } else { 255 }])
        });
        let config = ExtractionConfig {
            close_radius: 0,
            ..ExtractionConfig::default()
        };
        let result = extract(&gray, &config).unwrap();
        assert!(result.inners.is_empty());
    }

    #[test]
    fn oversized_holes_dropped() {
        let gray = plate_with_hole();
        let config = ExtractionConfig {
            max_hole_extent: Some(2.0),
            ..ExtractionConfig::default()
        };
        let result = extract(&gray, &config).unwrap();
        assert!(result.inners.is_empty());
    }

    #[test]
    fn circular_outline_skipped_when_capped() {
        // A solid disc plus a thin bar: with the cap the bar wins even
        // though the disc is larger.
        let gray = GrayImage::from_fn(200, 200, |x, y| {
            let dx = f64::from(x) - 100.0;
            let dy = f64::from(y) - 100.0;
            let disc = dx.hypot(dy) < 60.0;
            let bar = (5..105).contains(&x) && (5..15).contains(&y);
            image::Luma([if disc || bar { 0 } else { 255 }])
        });
        let uncapped = extract(&gray, &ExtractionConfig::default()).unwrap();
        let capped = extract(
            &gray,
            &ExtractionConfig {
                max_outer_circularity: Some(0.6),
                ..ExtractionConfig::default()
            },
        )
        .unwrap();
        assert!(uncapped.outer.perimeter() > capped.outer.perimeter());
        assert_eq!(capped.outer.len(), 4);
    }

    #[test]
    fn bow_tie_self_intersects() {
        let bow = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
            Point::new(0.0, 2.0),
        ];
        assert_eq!(find_self_intersection(&bow), Some((0, 2)));

        let square = [
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ];
        assert_eq!(find_self_intersection(&square), None);
    }
}
