//! QC overlay geometry shared by the raster and SVG renderers.
//!
//! A [`QcScene`] flattens a pipeline run into plain layers in workspace
//! inches: grid, region boxes, skeleton, contours, torch-on cut paths,
//! rapid traverses, ideal slots and snapped teeth. Arcs are sampled into
//! short chords so both renderers only ever draw polylines.

use std::f64::consts::TAU;

use brok_pipeline::types::points_bounds;
use brok_pipeline::{ArcDirection, BoundingBox, MotionPrimitive, Point, RunOutput, ToolpathProgram};

/// Grid spacing in inches.
pub const GRID_STEP: f64 = 0.5;

/// Border around the drawn geometry, in inches.
const MARGIN: f64 = 0.5;

/// Chord count for a full circle.
const ARC_SEGMENTS: f64 = 128.0;

/// Flattened overlay layers, all in workspace inches (y up).
#[derive(Debug, Clone, PartialEq)]
pub struct QcScene {
    /// Drawn area, snapped outwards to the grid.
    pub view: BoundingBox,
    /// Region boxes used for the final planning attempt.
    pub regions: Vec<(String, BoundingBox)>,
    /// Snap candidates.
    pub skeleton: Vec<Point>,
    /// Extracted loops (implicitly closed).
    pub contours: Vec<Vec<Point>>,
    /// One polyline per torch-on interval.
    pub cuts: Vec<Vec<Point>>,
    /// Torch-off traverses.
    pub rapids: Vec<(Point, Point)>,
    /// Evenly spaced targets.
    pub ideals: Vec<Point>,
    /// Snapped tooth positions.
    pub teeth: Vec<Point>,
    /// Whether validation passed.
    pub passed: bool,
}

impl QcScene {
    /// Collect every layer from a finished run.
    #[must_use]
    pub fn from_run(run: &RunOutput) -> Self {
        let (cuts, rapids) = trace_program(&run.program);
        let regions: Vec<(String, BoundingBox)> = run
            .placements
            .iter()
            .map(|r| (r.region.clone(), r.bounds))
            .collect();
        let placements = run.placements.iter().flat_map(|r| &r.placements);

        let mut scene = Self {
            view: BoundingBox::new(0.0, 1.0, 0.0, 1.0),
            regions,
            skeleton: run.extraction.skeleton.points().to_vec(),
            contours: run
                .extraction
                .contours()
                .map(|c| c.points().to_vec())
                .collect(),
            cuts,
            rapids,
            ideals: placements.clone().map(|p| p.ideal).collect(),
            teeth: placements.map(|p| p.actual).collect(),
            passed: run.report.passed,
        };
        scene.view = scene.extent();
        scene
    }

    /// Bounds of everything drawn, grown by the margin and snapped to
    /// the grid.
    fn extent(&self) -> BoundingBox {
        let corners = self.regions.iter().flat_map(|(_, b)| {
            [Point::new(b.x_min, b.y_min), Point::new(b.x_max, b.y_max)]
        });
        let all: Vec<Point> = self
            .contours
            .iter()
            .flatten()
            .chain(self.cuts.iter().flatten())
            .chain(self.rapids.iter().flat_map(|(a, b)| [a, b]))
            .chain(&self.skeleton)
            .copied()
            .chain(corners)
            .collect();
        let b = points_bounds(&all).unwrap_or(BoundingBox::new(0.0, 1.0, 0.0, 1.0));
        BoundingBox::new(
            snap_down(b.x_min - MARGIN),
            snap_up(b.x_max + MARGIN),
            snap_down(b.y_min - MARGIN),
            snap_up(b.y_max + MARGIN),
        )
    }

    /// Grid line positions `(xs, ys)` inside the view.
    #[must_use]
    pub fn grid_lines(&self) -> (Vec<f64>, Vec<f64>) {
        (
            steps(self.view.x_min, self.view.x_max),
            steps(self.view.y_min, self.view.y_max),
        )
    }

    /// View width and height in inches.
    #[must_use]
    pub fn size(&self) -> (f64, f64) {
        (
            self.view.x_max - self.view.x_min,
            self.view.y_max - self.view.y_min,
        )
    }

    /// Map workspace inches to image coordinates (y down) at `ppi`.
    #[must_use]
    pub fn to_image(&self, p: Point, ppi: f64) -> (f64, f64) {
        ((p.x - self.view.x_min) * ppi, (self.view.y_max - p.y) * ppi)
    }
}

fn snap_down(v: f64) -> f64 {
    (v / GRID_STEP).floor() * GRID_STEP
}

fn snap_up(v: f64) -> f64 {
    (v / GRID_STEP).ceil() * GRID_STEP
}

fn steps(lo: f64, hi: f64) -> Vec<f64> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = ((hi - lo) / GRID_STEP).round().max(0.0) as usize;
    #[allow(clippy::cast_precision_loss)]
    (0..=n).map(|i| GRID_STEP.mul_add(i as f64, lo)).collect()
}

/// Split a program into cut polylines and rapid segments.
///
/// A cut polyline starts at the position where the torch fires and
/// follows every cutting move until it goes out; arcs are sampled.
#[must_use]
pub fn trace_program(program: &ToolpathProgram) -> (Vec<Vec<Point>>, Vec<(Point, Point)>) {
    let mut cuts = Vec::new();
    let mut rapids = Vec::new();
    let mut position: Option<Point> = None;
    let mut current: Option<Vec<Point>> = None;

    for primitive in program.primitives() {
        match *primitive {
            MotionPrimitive::ToolOn => current = Some(position.into_iter().collect()),
            MotionPrimitive::ToolOff => {
                if let Some(path) = current.take() {
                    cuts.push(path);
                }
            }
            MotionPrimitive::RapidMove(to) => {
                if let Some(from) = position {
                    rapids.push((from, to));
                }
                position = Some(to);
            }
            MotionPrimitive::LinearCut { to, .. } => {
                if let Some(path) = current.as_mut() {
                    path.push(to);
                }
                position = Some(to);
            }
            MotionPrimitive::ArcCut {
                to, i, j, direction, ..
            } => {
                if let (Some(path), Some(from)) = (current.as_mut(), position) {
                    path.extend(sample_arc(from, to, i, j, direction));
                }
                position = Some(to);
            }
            _ => {}
        }
    }
    if let Some(path) = current {
        cuts.push(path);
    }
    (cuts, rapids)
}

/// Points along an arc from `from` (excluded) to `to` (included) around
/// `from + (i, j)`. Coincident end points mean a full circle.
fn sample_arc(from: Point, to: Point, i: f64, j: f64, direction: ArcDirection) -> Vec<Point> {
    let center = Point::new(from.x + i, from.y + j);
    let radius = i.hypot(j);
    let a0 = (from.y - center.y).atan2(from.x - center.x);
    let a1 = (to.y - center.y).atan2(to.x - center.x);
    let mut sweep = match direction {
        ArcDirection::CounterClockwise => (a1 - a0).rem_euclid(TAU),
        ArcDirection::Clockwise => -(a0 - a1).rem_euclid(TAU),
    };
    if sweep.abs() <= 1e-12 {
        sweep = match direction {
            ArcDirection::CounterClockwise => TAU,
            ArcDirection::Clockwise => -TAU,
        };
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let n = (sweep.abs() / TAU * ARC_SEGMENTS).ceil().max(1.0) as usize;
    let mut points: Vec<Point> = (1..n)
        .map(|k| {
            #[allow(clippy::cast_precision_loss)]
            let a = sweep.mul_add(k as f64 / n as f64, a0);
            Point::new(radius.mul_add(a.cos(), center.x), radius.mul_add(a.sin(), center.y))
        })
        .collect();
    points.push(to);
    points
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn full_circle_is_sampled_back_to_start() {
        let from = Point::new(0.0, 0.0);
        let pts = sample_arc(from, from, 1.0, 0.0, ArcDirection::Clockwise);
        assert_eq!(pts.len(), 128);
        assert_eq!(*pts.last().unwrap(), from);
        assert!(pts.iter().all(|p| (p.distance(Point::new(1.0, 0.0)) - 1.0).abs() < 1e-9));
        // Clockwise from the leftmost point heads up first.
        assert!(pts[0].y > 0.0);
    }

    #[test]
    fn counter_clockwise_from_leftmost_heads_down() {
        let from = Point::new(0.0, 0.0);
        let pts = sample_arc(from, from, 1.0, 0.0, ArcDirection::CounterClockwise);
        assert!(pts[0].y < 0.0);
    }

    #[test]
    fn program_splits_into_cuts_and_rapids() {
        let program = ToolpathProgram::new(vec![
            MotionPrimitive::RapidMove(Point::new(1.0, 1.0)),
            MotionPrimitive::ToolOn,
            MotionPrimitive::LinearCut {
                to: Point::new(2.0, 1.0),
                feed: 47.0,
            },
            MotionPrimitive::ToolOff,
            MotionPrimitive::RapidMove(Point::new(0.0, 0.0)),
        ]);
        let (cuts, rapids) = trace_program(&program);
        assert_eq!(cuts, vec![vec![Point::new(1.0, 1.0), Point::new(2.0, 1.0)]]);
        assert_eq!(rapids, vec![(Point::new(2.0, 1.0), Point::new(0.0, 0.0))]);
    }

    #[test]
    fn grid_steps_cover_view() {
        assert_eq!(steps(0.0, 1.5), vec![0.0, 0.5, 1.0, 1.5]);
        assert!((snap_down(0.7) - 0.5).abs() < 1e-12);
        assert!((snap_up(0.7) - 1.0).abs() < 1e-12);
    }
}
