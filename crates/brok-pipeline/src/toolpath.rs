//! Machine-independent motion primitives.
//!
//! A [`ToolpathProgram`] is an ordered list of [`MotionPrimitive`]s. It
//! carries no text formatting; `brok-export` turns it into G-code.

use serde::Serialize;

use crate::types::Point;

/// Direction of a circular arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArcDirection {
    /// Clockwise (`G2`).
    Clockwise,
    /// Counter-clockwise (`G3`).
    CounterClockwise,
}

/// One step of the cutting program.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum MotionPrimitive {
    /// Operator-visible annotation.
    Comment(String),
    /// Torch-off traverse in the XY plane.
    RapidMove(Point),
    /// Declare the current Z as zero.
    SetOffset,
    /// Probe toward `z` until the plate is touched.
    ProbeDown {
        /// Target depth.
        z: f64,
        /// Probe feed.
        feed: f64,
    },
    /// Back off toward `z` until the probe releases.
    ProbeRelease {
        /// Target height.
        z: f64,
        /// Release feed.
        feed: f64,
    },
    /// Rapid to height `z`.
    Retract(f64),
    /// Fire the torch.
    ToolOn,
    /// Extinguish the torch.
    ToolOff,
    /// Hold position for the given seconds.
    Dwell(f64),
    /// Feed down to height `z`.
    Plunge(f64),
    /// Straight cut to `to`.
    LinearCut {
        /// End point.
        to: Point,
        /// Cutting feed.
        feed: f64,
    },
    /// Circular cut to `to` around the centre `start + (i, j)`.
    ArcCut {
        /// End point.
        to: Point,
        /// Centre x offset from the start.
        i: f64,
        /// Centre y offset from the start.
        j: f64,
        /// Cutting feed.
        feed: f64,
        /// Arc direction.
        direction: ArcDirection,
    },
}

impl MotionPrimitive {
    /// XY end point of a move, if the primitive moves in the plane.
    #[must_use]
    pub const fn xy_target(&self) -> Option<Point> {
        match self {
            Self::RapidMove(p) | Self::LinearCut { to: p, .. } | Self::ArcCut { to: p, .. } => {
                Some(*p)
            }
            _ => None,
        }
    }
}

/// Ordered motion primitives for a whole job.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolpathProgram {
    primitives: Vec<MotionPrimitive>,
}

impl ToolpathProgram {
    /// Wrap a primitive list.
    #[must_use]
    pub const fn new(primitives: Vec<MotionPrimitive>) -> Self {
        Self { primitives }
    }

    /// The primitives in execution order.
    #[must_use]
    pub fn primitives(&self) -> &[MotionPrimitive] {
        &self.primitives
    }

    /// Number of primitives.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Returns `true` if the program is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Number of torch firings.
    #[must_use]
    pub fn pierce_count(&self) -> usize {
        self.primitives
            .iter()
            .filter(|p| matches!(p, MotionPrimitive::ToolOn))
            .count()
    }

    /// Positions visited during each torch-on interval: the XY position
    /// when the torch fires followed by the end point of every cut until
    /// it goes out. Arcs contribute their end point only.
    #[must_use]
    pub fn cut_paths(&self) -> Vec<Vec<Point>> {
        let mut paths = Vec::new();
        let mut position: Option<Point> = None;
        let mut current: Option<Vec<Point>> = None;

        for primitive in &self.primitives {
            match primitive {
                MotionPrimitive::ToolOn => {
                    current = Some(position.into_iter().collect());
                }
                MotionPrimitive::ToolOff => {
                    if let Some(path) = current.take() {
                        paths.push(path);
                    }
                }
                other => {
                    if let Some(p) = other.xy_target() {
                        position = Some(p);
                        if let Some(path) = current.as_mut() {
                            path.push(p);
                        }
                    }
                }
            }
        }
        if let Some(path) = current {
            paths.push(path);
        }
        paths
    }

    /// Total XY length of cutting moves (arcs measured along the arc).
    #[must_use]
    pub fn cut_length(&self) -> f64 {
        let mut position: Option<Point> = None;
        let mut length = 0.0;
        for primitive in &self.primitives {
            match *primitive {
                MotionPrimitive::LinearCut { to, .. } => {
                    if let Some(from) = position {
                        length += from.distance(to);
                    }
                    position = Some(to);
                }
                MotionPrimitive::ArcCut {
                    to, i, j, direction, ..
                } => {
                    if let Some(from) = position {
                        length += arc_length(from, to, i, j, direction);
                    }
                    position = Some(to);
                }
                MotionPrimitive::RapidMove(p) => position = Some(p),
                _ => {}
            }
        }
        length
    }
}

/// Length of an arc from `from` to `to` around `from + (i, j)`. Coincident
/// end points mean a full circle.
fn arc_length(from: Point, to: Point, i: f64, j: f64, direction: ArcDirection) -> f64 {
    let center = Point::new(from.x + i, from.y + j);
    let radius = i.hypot(j);
    let a0 = (from.y - center.y).atan2(from.x - center.x);
    let a1 = (to.y - center.y).atan2(to.x - center.x);
    let tau = std::f64::consts::TAU;
    let mut sweep = match direction {
        ArcDirection::CounterClockwise => (a1 - a0).rem_euclid(tau),
        ArcDirection::Clockwise => (a0 - a1).rem_euclid(tau),
    };
    if sweep <= 1e-12 {
        sweep = tau;
    }
    radius * sweep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cut(x: f64, y: f64) -> MotionPrimitive {
        MotionPrimitive::LinearCut {
            to: Point::new(x, y),
            feed: 47.0,
        }
    }

    #[test]
    fn cut_paths_split_on_torch() {
        let program = ToolpathProgram::new(vec![
            MotionPrimitive::RapidMove(Point::new(0.0, 0.0)),
            MotionPrimitive::ToolOn,
            cut(1.0, 0.0),
            cut(1.0, 1.0),
            MotionPrimitive::ToolOff,
            MotionPrimitive::RapidMove(Point::new(5.0, 5.0)),
            MotionPrimitive::Retract(0.148),
            MotionPrimitive::ToolOn,
            cut(6.0, 5.0),
            MotionPrimitive::ToolOff,
            MotionPrimitive::RapidMove(Point::new(0.0, 0.0)),
        ]);
        let paths = program.cut_paths();
        assert_eq!(
            paths,
            vec![
                vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)],
                vec![Point::new(5.0, 5.0), Point::new(6.0, 5.0)],
            ]
        );
        assert_eq!(program.pierce_count(), 2);
    }

    #[test]
    fn cut_length_sums_linear_and_arc() {
        let program = ToolpathProgram::new(vec![
            MotionPrimitive::RapidMove(Point::new(0.0, 0.0)),
            MotionPrimitive::ToolOn,
            cut(3.0, 4.0),
            MotionPrimitive::ArcCut {
                to: Point::new(3.0, 4.0),
                i: 1.0,
                j: 0.0,
                feed: 47.0,
                direction: ArcDirection::Clockwise,
            },
            MotionPrimitive::ToolOff,
        ]);
        let expected = 5.0 + std::f64::consts::TAU;
        assert!((program.cut_length() - expected).abs() < 1e-9);
    }

    #[test]
    fn quarter_arc_length() {
        let l = arc_length(
            Point::new(-1.0, 0.0),
            Point::new(0.0, 1.0),
            1.0,
            0.0,
            ArcDirection::Clockwise,
        );
        assert!((l - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        let l = arc_length(
            Point::new(-1.0, 0.0),
            Point::new(0.0, 1.0),
            1.0,
            0.0,
            ArcDirection::CounterClockwise,
        );
        assert!((l - 3.0 * std::f64::consts::FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn empty_program() {
        let program = ToolpathProgram::default();
        assert!(program.is_empty());
        assert!(program.cut_paths().is_empty());
        assert!(program.cut_length().abs() < f64::EPSILON);
    }
}
