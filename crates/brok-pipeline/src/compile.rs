//! Toolpath compilation: oriented loops and tooth placements in, motion
//! primitives out.
//!
//! Every loop gets the same envelope: rapid to the pierce point, probe
//! the plate, fire at pierce height, dwell, drop to cut height, cut the
//! loop (with teeth spliced in), optional overcut, torch off, retract.
//! Loops are emitted in the order given and never interleaved.

use geo::{Closest, ClosestPoint, Line};
use serde::Serialize;
use tracing::{debug, info};

use crate::bevel::{OrientedContour, Winding};
use crate::config::{FeatureSpec, MachineConfig, RingSpec, ToothDirection};
use crate::error::CompileError;
use crate::plan::PlacementResult;
use crate::toolpath::{ArcDirection, MotionPrimitive, ToolpathProgram};
use crate::types::{ContourId, ContourKind, Point};

/// Distances below this are treated as coincident.
const EPS: f64 = 1e-9;

/// A tooth to splice into a contour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooth {
    /// Region the tooth came from.
    pub region: String,
    /// Slot index within the region.
    pub slot: usize,
    /// Snapped position.
    pub anchor: Point,
    /// Contour receiving the tooth.
    pub target: ContourId,
    /// Base width along the contour.
    pub width: f64,
    /// Tip height.
    pub height: f64,
    /// Tip direction.
    pub direction: ToothDirection,
}

impl Tooth {
    /// One tooth per placement, sized from the region's spec.
    #[must_use]
    pub fn from_placements(result: &PlacementResult, spec: &FeatureSpec) -> Vec<Self> {
        result
            .placements
            .iter()
            .map(|p| Self {
                region: result.region.clone(),
                slot: p.slot,
                anchor: p.actual,
                target: result.target,
                width: spec.tooth_width,
                height: spec.tooth_height,
                direction: spec.tooth_direction,
            })
            .collect()
    }
}

/// Move each anchor onto the nearest point of its target loop.
///
/// Medial-axis snaps sit inside the material; this puts their teeth on
/// the cut. Teeth whose target is not in `contours` are left for
/// [`compile`] to reject.
pub fn project_onto_targets(teeth: &mut [Tooth], contours: &[OrientedContour]) {
    for tooth in teeth {
        let Some(contour) = contours.iter().find(|c| c.id() == tooth.target) else {
            continue;
        };
        if contour.points().is_empty() {
            continue;
        }
        let (_, foot, distance) = LoopWalk::new(contour.points()).project(tooth.anchor);
        debug!(
            region = %tooth.region,
            slot = tooth.slot,
            distance,
            "projected anchor onto contour"
        );
        tooth.anchor = foot;
    }
}

/// Settings shared by every cut in a program.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    /// Heights, feeds, probing, lead-in and overcut.
    pub machine: &'a MachineConfig,
    /// Maximum anchor distance from its edge.
    pub edge_tolerance: f64,
}

/// Compile contours (in cutting order), teeth and an optional ring into a
/// program. The ring, when present, is cut last.
///
/// # Errors
///
/// Returns [`CompileError::TooFewPoints`] for a loop under three points,
/// [`CompileError::UnknownTarget`] for a tooth whose contour is not in
/// `contours`, [`CompileError::OffEdge`] for an anchor further than
/// `edge_tolerance` from its contour, and
/// [`CompileError::OverlappingTeeth`] when two teeth share loop length.
pub fn compile(
    contours: &[OrientedContour],
    teeth: &[Tooth],
    ring: Option<&RingSpec>,
    options: &CompileOptions<'_>,
) -> Result<ToolpathProgram, CompileError> {
    if let Some(orphan) = teeth
        .iter()
        .find(|t| !contours.iter().any(|c| c.id() == t.target))
    {
        return Err(CompileError::UnknownTarget {
            region: orphan.region.clone(),
            id: orphan.target,
        });
    }

    let machine = options.machine;
    let mut out = Vec::new();
    let mut index = 0;

    for contour in contours {
        index += 1;
        let own: Vec<&Tooth> = teeth.iter().filter(|t| t.target == contour.id()).collect();
        let path = contour_path(contour, &own, options.edge_tolerance)?;

        out.push(MotionPrimitive::Comment(format!(
            "Cut {index}: {} contour {} {}",
            contour.kind(),
            contour.id(),
            contour.winding()
        )));
        emit_loop(&mut out, &path, machine);
        debug!(contour = %contour.id(), points = path.len(), teeth = own.len(), "compiled contour");
    }

    if let Some(ring) = ring {
        index += 1;
        emit_ring(&mut out, ring, index, machine);
    }

    if let Some(home) = machine.home {
        out.push(MotionPrimitive::RapidMove(home));
    }

    let program = ToolpathProgram::new(out);
    info!(
        primitives = program.len(),
        pierces = program.pierce_count(),
        "toolpath compiled"
    );
    Ok(program)
}

/// Closed cutting path for one contour: the start point, every vertex
/// (with teeth spliced in) and the start point again.
fn contour_path(
    contour: &OrientedContour,
    teeth: &[&Tooth],
    edge_tolerance: f64,
) -> Result<Vec<Point>, CompileError> {
    let points = contour.points();
    if points.len() < 3 {
        return Err(CompileError::TooFewPoints {
            id: contour.id(),
            points: points.len(),
        });
    }

    let walk = LoopWalk::new(points);
    let mut spans = Vec::with_capacity(teeth.len());
    for tooth in teeth {
        let (s, foot, distance) = walk.project(tooth.anchor);
        if distance > edge_tolerance {
            return Err(CompileError::OffEdge {
                region: tooth.region.clone(),
                slot: tooth.slot,
                id: contour.id(),
                x: tooth.anchor.x,
                y: tooth.anchor.y,
                distance,
            });
        }
        let half = tooth.width / 2.0;
        let (dx, dy) = tooth.direction.unit();
        spans.push(ToothSpan {
            at: s,
            lo: s - half,
            hi: s + half,
            tip: foot.offset(dx, dy, tooth.height),
        });
    }
    spans.sort_by(|a, b| a.at.total_cmp(&b.at));
    check_overlap(contour.id(), &spans, walk.total)?;

    // A span crossing the start point moves the start to its far end.
    let total = walk.total;
    let start_at = spans
        .iter()
        .find(|span| span.lo < 0.0 || span.hi > total)
        .map_or(0.0, |span| span.hi.rem_euclid(total));
    for span in &mut spans {
        if span.lo < start_at - EPS {
            span.lo += total;
            span.hi += total;
        }
    }
    spans.sort_by(|a, b| a.lo.total_cmp(&b.lo));

    // Vertices in travel order from `start_at`, as unwrapped arc lengths.
    let mut vertices: Vec<(f64, Point)> = points
        .iter()
        .zip(&walk.cumulative)
        .map(|(&p, &c)| (if c > start_at + EPS { c } else { c + total }, p))
        .collect();
    vertices.sort_by(|a, b| a.0.total_cmp(&b.0));

    let start = walk.point_at(start_at);
    let mut path = PathBuilder::new(start);
    let mut spans = spans.into_iter().peekable();
    for (s, vertex) in vertices {
        while let Some(span) = spans.next_if(|span| span.lo <= s) {
            path.splice(&walk, &span);
        }
        if s > path.skip_until + EPS {
            path.push(vertex);
        }
    }
    for span in spans {
        path.splice(&walk, &span);
    }
    Ok(path.finish(start))
}

/// Reject teeth whose spans share loop length, including the pair that
/// meets across the start point.
fn check_overlap(id: ContourId, spans: &[ToothSpan], total: f64) -> Result<(), CompileError> {
    let neighbours = spans
        .windows(2)
        .map(|w| (&w[0], &w[1], 0.0))
        .chain(spans.last().zip(spans.first()).map(|(a, b)| (a, b, total)));
    for (a, b, shift) in neighbours {
        if b.lo + shift < a.hi {
            return Err(CompileError::OverlappingTeeth {
                id,
                first: a.at,
                second: b.at,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct ToothSpan {
    at: f64,
    lo: f64,
    hi: f64,
    tip: Point,
}

/// Accumulates path points, dropping consecutive duplicates.
struct PathBuilder {
    points: Vec<Point>,
    skip_until: f64,
}

impl PathBuilder {
    fn new(start: Point) -> Self {
        Self {
            points: vec![start],
            skip_until: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, p: Point) {
        if self.points.last().is_none_or(|last| !last.approx_eq(p, EPS)) {
            self.points.push(p);
        }
    }

    /// Base start, tip, base end; loop vertices up to the base end are
    /// skipped.
    fn splice(&mut self, walk: &LoopWalk<'_>, span: &ToothSpan) {
        self.push(walk.point_at(span.lo));
        self.push(span.tip);
        self.push(walk.point_at(span.hi));
        self.skip_until = span.hi;
    }

    fn finish(mut self, start: Point) -> Vec<Point> {
        self.push(start);
        if self.points.len() == 1 {
            self.points.push(start);
        }
        self.points
    }
}

/// Arc-length parameterisation of a closed loop.
struct LoopWalk<'a> {
    points: &'a [Point],
    /// `cumulative[i]` is the length from the start to vertex `i`;
    /// `cumulative[n]` is the full perimeter.
    cumulative: Vec<f64>,
    total: f64,
}

impl<'a> LoopWalk<'a> {
    fn new(points: &'a [Point]) -> Self {
        let n = points.len();
        let mut cumulative = Vec::with_capacity(n + 1);
        let mut acc = 0.0;
        cumulative.push(0.0);
        for i in 0..n {
            acc += points[i].distance(points[(i + 1) % n]);
            cumulative.push(acc);
        }
        Self {
            points,
            cumulative,
            total: acc,
        }
    }

    fn edge(&self, k: usize) -> (Point, Point) {
        (self.points[k], self.points[(k + 1) % self.points.len()])
    }

    /// Arc-length position, foot point and distance of the nearest point
    /// on the loop to `p`. Ties go to the earliest edge.
    fn project(&self, p: Point) -> (f64, Point, f64) {
        let query = geo::Point::new(p.x, p.y);
        let mut best = (0.0, self.points[0], f64::INFINITY);
        for k in 0..self.points.len() {
            let (a, b) = self.edge(k);
            let line = Line::new(geo::coord! { x: a.x, y: a.y }, geo::coord! { x: b.x, y: b.y });
            let foot = match line.closest_point(&query) {
                Closest::Intersection(c) | Closest::SinglePoint(c) => Point::new(c.x(), c.y()),
                Closest::Indeterminate => a,
            };
            let d = foot.distance(p);
            if d < best.2 - EPS {
                best = (self.cumulative[k] + a.distance(foot), foot, d);
            }
        }
        best
    }

    /// Point at arc length `s`, taken modulo the perimeter.
    fn point_at(&self, s: f64) -> Point {
        if self.total <= EPS {
            return self.points[0];
        }
        let s = s.rem_euclid(self.total);
        let n = self.points.len();
        for k in 0..n {
            let (c0, c1) = (self.cumulative[k], self.cumulative[k + 1]);
            if s <= c1 {
                let (a, b) = self.edge(k);
                let len = c1 - c0;
                if len <= EPS {
                    return a;
                }
                return a.lerp(b, (s - c0) / len);
            }
        }
        self.points[0]
    }
}

/// Left-hand unit normal of the travel direction `a -> b`.
fn left_normal(a: Point, b: Point) -> (f64, f64) {
    let len = a.distance(b);
    if len <= EPS {
        return (0.0, 0.0);
    }
    (-(b.y - a.y) / len, (b.x - a.x) / len)
}

/// Probe, pierce and plunge at the current XY position.
fn emit_pierce(out: &mut Vec<MotionPrimitive>, machine: &MachineConfig) {
    out.extend([
        MotionPrimitive::SetOffset,
        MotionPrimitive::ProbeDown {
            z: machine.probe.seek_depth,
            feed: machine.probe.seek_feed,
        },
        MotionPrimitive::ProbeRelease {
            z: machine.probe.release_height,
            feed: machine.probe.release_feed,
        },
        MotionPrimitive::SetOffset,
        MotionPrimitive::Retract(machine.pierce_height),
        MotionPrimitive::ToolOn,
        MotionPrimitive::Dwell(machine.pierce_dwell),
        MotionPrimitive::Plunge(machine.cut_height),
    ]);
}

fn emit_loop(out: &mut Vec<MotionPrimitive>, path: &[Point], machine: &MachineConfig) {
    let feed = machine.feed_rate;
    let start = path[0];
    let pierce = if machine.lead_in > 0.0 {
        let (nx, ny) = left_normal(path[0], path[1]);
        start.offset(nx, ny, machine.lead_in)
    } else {
        start
    };

    out.push(MotionPrimitive::RapidMove(pierce));
    emit_pierce(out, machine);
    if machine.lead_in > 0.0 {
        out.push(MotionPrimitive::LinearCut { to: start, feed });
    }
    out.extend(
        path[1..]
            .iter()
            .map(|&to| MotionPrimitive::LinearCut { to, feed }),
    );

    let mut remaining = machine.overcut;
    for pair in path.windows(2) {
        if remaining <= EPS {
            break;
        }
        let len = pair[0].distance(pair[1]);
        if len <= EPS {
            continue;
        }
        let to = if len <= remaining {
            pair[1]
        } else {
            pair[0].lerp(pair[1], remaining / len)
        };
        out.push(MotionPrimitive::LinearCut { to, feed });
        remaining -= len.min(remaining);
    }

    out.extend([
        MotionPrimitive::ToolOff,
        MotionPrimitive::Retract(machine.safe_height),
    ]);
}

fn emit_ring(out: &mut Vec<MotionPrimitive>, ring: &RingSpec, index: usize, machine: &MachineConfig) {
    let feed = machine.feed_rate;
    let r = ring.diameter / 2.0;
    let start = Point::new(ring.center.x - r, ring.center.y);
    let winding = Winding::required_for(ring.kind);
    let direction = match winding {
        Winding::Cw => ArcDirection::Clockwise,
        Winding::Ccw => ArcDirection::CounterClockwise,
    };
    // Scrap lies outside an outer ring and inside an inner one.
    let scrap_dx = match ring.kind {
        ContourKind::Outer => -1.0,
        ContourKind::Inner => 1.0,
    };
    let pierce = start.offset(scrap_dx, 0.0, ring.lead_in);

    out.push(MotionPrimitive::Comment(format!(
        "Cut {index}: ring D={} {winding}",
        ring.diameter
    )));
    out.push(MotionPrimitive::RapidMove(pierce));
    emit_pierce(out, machine);
    if ring.lead_in > 0.0 {
        out.push(MotionPrimitive::LinearCut { to: start, feed });
    }
    out.push(MotionPrimitive::ArcCut {
        to: start,
        i: r,
        j: 0.0,
        feed,
        direction,
    });
    if machine.overcut > 0.0 {
        let theta = machine.overcut / r;
        let dy = match direction {
            ArcDirection::Clockwise => theta.sin(),
            ArcDirection::CounterClockwise => -theta.sin(),
        };
        let to = Point::new(
            r.mul_add(-theta.cos(), ring.center.x),
            r.mul_add(dy, ring.center.y),
        );
        out.push(MotionPrimitive::ArcCut {
            to,
            i: r,
            j: 0.0,
            feed,
            direction,
        });
    }
    out.extend([
        MotionPrimitive::ToolOff,
        MotionPrimitive::Retract(machine.safe_height),
    ]);
}
