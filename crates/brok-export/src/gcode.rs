//! G-code export serializer.
//!
//! Converts a [`ToolpathProgram`] into G-code text for a plasma table
//! with a probing torch height control.
//!
//! The output is absolute, inch-based (`G20`) and starts with a
//! parenthesised comment header identifying the program, followed by a
//! modal preamble and one line per motion primitive:
//!
//! | Primitive      | Line                          |
//! |----------------|-------------------------------|
//! | `Comment`      | `(text)`                      |
//! | `RapidMove`    | `G0 X.. Y..`                  |
//! | `SetOffset`    | `G92 Z0`                      |
//! | `ProbeDown`    | `G38.2 Z.. F..`               |
//! | `ProbeRelease` | `G38.4 Z.. F..`               |
//! | `Retract`      | `G0 Z..`                      |
//! | `ToolOn`       | `M3`                          |
//! | `ToolOff`      | `M5`                          |
//! | `Dwell`        | `G4 P<seconds>`               |
//! | `Plunge`       | `G1 Z..`                      |
//! | `LinearCut`    | `G1 X.. Y.. F..`              |
//! | `ArcCut`       | `G2`/`G3 X.. Y.. I.. J.. F..` |
//!
//! Numbers carry up to four decimals with trailing zeros trimmed.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use std::fmt::Write;

use brok_pipeline::{ArcDirection, MachineConfig, MotionPrimitive, ToolpathProgram};

/// Metadata to embed as comment lines at the top of the program.
///
/// All fields are optional. When present, the corresponding comment
/// line is emitted. Parentheses in the text are dropped so the comment
/// cannot close early.
#[derive(Debug, Clone, Default)]
pub struct GcodeMetadata<'a> {
    /// Source image filename -- emitted as `(Source: <filename>)`.
    pub title: Option<&'a str>,

    /// Free-form notes -- one comment line per text line.
    pub description: Option<&'a str>,

    /// Export timestamp -- emitted as `(Generated: <timestamp>)`.
    pub timestamp: Option<&'a str>,
}

/// Serialize a program into G-code text.
///
/// `machine` supplies the header summary and the modal feed rate.
///
/// # Examples
///
/// ```
/// use brok_export::gcode::{GcodeMetadata, to_gcode};
/// use brok_pipeline::{MachineConfig, MotionPrimitive, Point, ToolpathProgram};
///
/// let program = ToolpathProgram::new(vec![
///     MotionPrimitive::RapidMove(Point::new(1.5, 2.0)),
///     MotionPrimitive::ToolOn,
///     MotionPrimitive::LinearCut { to: Point::new(2.25, 2.0), feed: 47.0 },
///     MotionPrimitive::ToolOff,
/// ]);
/// let gcode = to_gcode(&program, &MachineConfig::default(), &GcodeMetadata::default());
/// assert!(gcode.starts_with("(brok)\n"));
/// assert!(gcode.contains("G0 X1.5 Y2\n"));
/// assert!(gcode.contains("G1 X2.25 Y2 F47\n"));
/// assert!(gcode.ends_with("M30\n"));
/// ```
#[must_use]
pub fn to_gcode(
    program: &ToolpathProgram,
    machine: &MachineConfig,
    metadata: &GcodeMetadata<'_>,
) -> String {
    let mut out = String::new();

    // --- Header ---
    let _ = writeln!(out, "(brok)");
    if let Some(title) = metadata.title {
        for line in title.lines() {
            let _ = writeln!(out, "(Source: {})", comment_text(line));
        }
    }
    if let Some(description) = metadata.description {
        for line in description.lines() {
            let _ = writeln!(out, "({})", comment_text(line));
        }
    }
    if let Some(timestamp) = metadata.timestamp {
        let _ = writeln!(out, "(Generated: {})", comment_text(timestamp));
    }
    let _ = writeln!(
        out,
        "(Feed:{} Pierce:{} Cut:{} Dwell:{})",
        num(machine.feed_rate),
        num(machine.pierce_height),
        num(machine.cut_height),
        num(machine.pierce_dwell),
    );
    let _ = writeln!(out, "G90 G94");
    let _ = writeln!(out, "G17");
    let _ = writeln!(out, "G20");
    let _ = writeln!(out, "F{}", num(machine.feed_rate));

    // --- Body ---
    for primitive in program.primitives() {
        let _ = writeln!(out, "{}", format_primitive(primitive));
    }

    let _ = writeln!(out, "M30");
    out
}

/// Render one primitive as a single G-code line (no trailing newline).
#[must_use]
pub fn format_primitive(primitive: &MotionPrimitive) -> String {
    match primitive {
        MotionPrimitive::Comment(text) => format!("({})", comment_text(text)),
        MotionPrimitive::RapidMove(p) => format!("G0 X{} Y{}", num(p.x), num(p.y)),
        MotionPrimitive::SetOffset => "G92 Z0".to_owned(),
        MotionPrimitive::ProbeDown { z, feed } => format!("G38.2 Z{} F{}", num(*z), num(*feed)),
        MotionPrimitive::ProbeRelease { z, feed } => {
            format!("G38.4 Z{} F{}", num(*z), num(*feed))
        }
        MotionPrimitive::Retract(z) => format!("G0 Z{}", num(*z)),
        MotionPrimitive::ToolOn => "M3".to_owned(),
        MotionPrimitive::ToolOff => "M5".to_owned(),
        MotionPrimitive::Dwell(seconds) => format!("G4 P{}", num(*seconds)),
        MotionPrimitive::Plunge(z) => format!("G1 Z{}", num(*z)),
        MotionPrimitive::LinearCut { to, feed } => {
            format!("G1 X{} Y{} F{}", num(to.x), num(to.y), num(*feed))
        }
        MotionPrimitive::ArcCut {
            to,
            i,
            j,
            feed,
            direction,
        } => {
            let code = match direction {
                ArcDirection::Clockwise => "G2",
                ArcDirection::CounterClockwise => "G3",
            };
            format!(
                "{code} X{} Y{} I{} J{} F{}",
                num(to.x),
                num(to.y),
                num(*i),
                num(*j),
                num(*feed)
            )
        }
    }
}

/// Format a number with at most four decimals, trailing zeros trimmed.
///
/// Values that round to zero print as `0`, never `-0`.
#[must_use]
pub fn num(value: f64) -> String {
    let s = format!("{value:.4}");
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    if s == "-0" {
        "0".to_owned()
    } else {
        s.to_owned()
    }
}

/// Drop characters that would end or nest a G-code comment.
fn comment_text(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '(' | ')')).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brok_pipeline::Point;

    use super::*;

    fn no_meta() -> GcodeMetadata<'static> {
        GcodeMetadata::default()
    }

    fn header_lines(gcode: &str) -> Vec<&str> {
        gcode.lines().take_while(|l| *l != "F47").collect()
    }

    // --- num ---

    #[test]
    fn num_trims_trailing_zeros() {
        assert_eq!(num(47.0), "47");
        assert_eq!(num(0.148), "0.148");
        assert_eq!(num(0.7), "0.7");
        assert_eq!(num(1.5), "1.5");
    }

    #[test]
    fn num_rounds_to_four_places() {
        assert_eq!(num(10.166_666_7), "10.1667");
        assert_eq!(num(-0.000_01), "0");
        assert_eq!(num(-2.5), "-2.5");
    }

    // --- header ---

    #[test]
    fn header_without_metadata() {
        let gcode = to_gcode(&ToolpathProgram::default(), &MachineConfig::default(), &no_meta());
        assert_eq!(
            gcode,
            "(brok)\n(Feed:47 Pierce:0.148 Cut:0.059 Dwell:0.7)\nG90 G94\nG17\nG20\nF47\nM30\n"
        );
    }

    #[test]
    fn metadata_emitted_in_order() {
        let meta = GcodeMetadata {
            title: Some("brok.png"),
            description: Some("regions: upper_jaw, lower_jaw"),
            timestamp: Some("2026-02-14_12-30-45"),
        };
        let gcode = to_gcode(&ToolpathProgram::default(), &MachineConfig::default(), &meta);
        let lines = header_lines(&gcode);
        assert_eq!(lines[0], "(brok)");
        assert_eq!(lines[1], "(Source: brok.png)");
        assert_eq!(lines[2], "(regions: upper_jaw, lower_jaw)");
        assert_eq!(lines[3], "(Generated: 2026-02-14_12-30-45)");
        assert!(lines[4].starts_with("(Feed:"));
    }

    #[test]
    fn parentheses_are_stripped_from_comments() {
        let meta = GcodeMetadata {
            title: Some("part (v2).png"),
            ..GcodeMetadata::default()
        };
        let gcode = to_gcode(&ToolpathProgram::default(), &MachineConfig::default(), &meta);
        assert!(gcode.contains("(Source: part v2.png)\n"));
        assert_eq!(
            format_primitive(&MotionPrimitive::Comment("Cut 1 (outer)".to_owned())),
            "(Cut 1 outer)"
        );
    }

    #[test]
    fn header_uses_machine_settings() {
        let machine = MachineConfig {
            feed_rate: 60.0,
            pierce_dwell: 0.5,
            ..MachineConfig::default()
        };
        let gcode = to_gcode(&ToolpathProgram::default(), &machine, &no_meta());
        assert!(gcode.contains("(Feed:60 Pierce:0.148 Cut:0.059 Dwell:0.5)\n"));
        assert!(gcode.contains("\nF60\n"));
    }

    // --- primitives ---

    #[test]
    fn every_primitive_formats() {
        let cases = [
            (MotionPrimitive::RapidMove(Point::new(9.45, 9.0)), "G0 X9.45 Y9"),
            (MotionPrimitive::SetOffset, "G92 Z0"),
            (
                MotionPrimitive::ProbeDown {
                    z: -5.0,
                    feed: 50.0,
                },
                "G38.2 Z-5 F50",
            ),
            (
                MotionPrimitive::ProbeRelease { z: 0.5, feed: 25.0 },
                "G38.4 Z0.5 F25",
            ),
            (MotionPrimitive::Retract(0.148), "G0 Z0.148"),
            (MotionPrimitive::ToolOn, "M3"),
            (MotionPrimitive::ToolOff, "M5"),
            (MotionPrimitive::Dwell(0.7), "G4 P0.7"),
            (MotionPrimitive::Plunge(0.059), "G1 Z0.059"),
            (
                MotionPrimitive::LinearCut {
                    to: Point::new(10.2, 9.0),
                    feed: 47.0,
                },
                "G1 X10.2 Y9 F47",
            ),
            (
                MotionPrimitive::ArcCut {
                    to: Point::new(0.75, 6.75),
                    i: 6.0,
                    j: 0.0,
                    feed: 47.0,
                    direction: ArcDirection::Clockwise,
                },
                "G2 X0.75 Y6.75 I6 J0 F47",
            ),
            (
                MotionPrimitive::ArcCut {
                    to: Point::new(0.75, 6.75),
                    i: 6.0,
                    j: 0.0,
                    feed: 47.0,
                    direction: ArcDirection::CounterClockwise,
                },
                "G3 X0.75 Y6.75 I6 J0 F47",
            ),
        ];
        for (primitive, expected) in cases {
            assert_eq!(format_primitive(&primitive), expected);
        }
    }

    #[test]
    fn body_follows_preamble_and_ends_with_m30() {
        let program = ToolpathProgram::new(vec![
            MotionPrimitive::Comment("Cut 1".to_owned()),
            MotionPrimitive::RapidMove(Point::new(1.0, 1.0)),
            MotionPrimitive::ToolOn,
            MotionPrimitive::ToolOff,
        ]);
        let gcode = to_gcode(&program, &MachineConfig::default(), &no_meta());
        let lines: Vec<&str> = gcode.lines().collect();
        let f_line = lines.iter().position(|l| *l == "F47").unwrap();
        assert_eq!(
            &lines[f_line + 1..],
            &["(Cut 1)", "G0 X1 Y1", "M3", "M5", "M30"]
        );
    }
}
