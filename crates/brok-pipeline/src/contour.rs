//! Border tracing and the pixel-to-inch frame.
//!
//! Borders are traced with Suzuki-Abe border following
//! (`imageproc::contours::find_contours`), which also reports the
//! hierarchy needed to tell holes from top-level outlines. Traced
//! borders stay in pixel coordinates until [`PixelFrame::to_inches`]
//! maps them into the y-up workspace.

use image::GrayImage;
use imageproc::contours::BorderType;

use crate::types::{Dimensions, Point};

/// Whether a border is a top-level outline or a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderRole {
    /// Outer border of a connected material region.
    Outline,
    /// Border of a background region enclosed by material.
    Hole,
}

/// One traced border in pixel coordinates (y-down).
#[derive(Debug, Clone, PartialEq)]
pub struct TracedBorder {
    /// Pixel centres along the border, consecutive duplicates removed.
    pub points: Vec<Point>,
    /// Outline or hole.
    pub role: BorderRole,
    /// Index of the enclosing border in the traced list, if any.
    pub parent: Option<usize>,
}

impl TracedBorder {
    /// Absolute enclosed area in square pixels.
    #[must_use]
    pub fn area(&self) -> f64 {
        shoelace(&self.points).abs()
    }

    /// Closed-loop perimeter in pixels.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        loop_length(&self.points)
    }

    /// Isoperimetric ratio `4πA / P²`: 1 for a circle, about 0.785 for a
    /// square, approaching 0 for thin or ragged shapes.
    #[must_use]
    pub fn circularity(&self) -> f64 {
        circularity(self.area(), self.perimeter())
    }
}

/// Trace every border of the material mask (non-zero pixels).
///
/// Indices in the returned list match the `parent` links.
#[must_use = "returns the traced borders"]
pub fn trace_borders(mask: &GrayImage) -> Vec<TracedBorder> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(mask);

    contours
        .into_iter()
        .map(|c| {
            let mut points: Vec<Point> = Vec::with_capacity(c.points.len());
            for p in c.points {
                let q = Point::new(f64::from(p.x) + 0.5, f64::from(p.y) + 0.5);
                if points.last() != Some(&q) {
                    points.push(q);
                }
            }
            if points.len() > 1 && points.first() == points.last() {
                points.pop();
            }
            TracedBorder {
                points,
                role: match c.border_type {
                    BorderType::Outer => BorderRole::Outline,
                    BorderType::Hole => BorderRole::Hole,
                },
                parent: c.parent,
            }
        })
        .collect()
}

/// Uniform scale and offset from image pixels to workspace inches.
///
/// The image's longest side spans `fit_size` inches, the image centre
/// lands on `center`, and the y axis is flipped so up is positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelFrame {
    /// Inches per pixel.
    pub scale: f64,
    /// Source image size.
    pub dimensions: Dimensions,
    /// Workspace position of the image centre.
    pub center: Point,
}

impl PixelFrame {
    /// Build the frame for an image of the given size.
    #[must_use]
    pub fn fit(dimensions: Dimensions, fit_size: f64, center: Point) -> Self {
        let longest = dimensions.width.max(dimensions.height).max(1);
        Self {
            scale: fit_size / f64::from(longest),
            dimensions,
            center,
        }
    }

    /// Map a pixel-space point to workspace inches.
    #[must_use]
    pub fn to_inches(&self, p: Point) -> Point {
        let half_w = f64::from(self.dimensions.width) / 2.0;
        let half_h = f64::from(self.dimensions.height) / 2.0;
        Point::new(
            (p.x - half_w).mul_add(self.scale, self.center.x),
            (half_h - p.y).mul_add(self.scale, self.center.y),
        )
    }

    /// Map workspace inches back to pixel space.
    #[must_use]
    pub fn to_pixels(&self, p: Point) -> Point {
        let half_w = f64::from(self.dimensions.width) / 2.0;
        let half_h = f64::from(self.dimensions.height) / 2.0;
        Point::new(
            (p.x - self.center.x) / self.scale + half_w,
            half_h - (p.y - self.center.y) / self.scale,
        )
    }

    /// Square inches per square pixel.
    #[must_use]
    pub fn area_scale(&self) -> f64 {
        self.scale * self.scale
    }
}

/// Isoperimetric ratio `4πA / P²`. Zero for a zero perimeter.
#[must_use]
pub fn circularity(area: f64, perimeter: f64) -> f64 {
    if perimeter <= 0.0 {
        return 0.0;
    }
    4.0 * std::f64::consts::PI * area / (perimeter * perimeter)
}

/// Signed shoelace area of an implicitly closed loop (positive when
/// counter-clockwise in a y-up frame).
#[must_use]
pub fn shoelace(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x.mul_add(b.y, -(b.x * a.y))
        })
        .sum();
    twice / 2.0
}

fn loop_length(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| points[i].distance(points[(i + 1) % n])).sum()
}
