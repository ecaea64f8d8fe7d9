//! Self-check of planned teeth against the configuration.
//!
//! Pure reporting: nothing is mutated and nothing is retried here. The
//! orchestrator decides what to do with a failing report.

use std::fmt::Write;

use serde::Serialize;
use tracing::warn;

use crate::config::FeatureSpec;
use crate::plan::PlacementResult;
use crate::types::Point;

/// Verdict for one tooth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCheck {
    /// Slot index.
    pub slot: usize,
    /// Ideal position.
    pub ideal: Point,
    /// Snapped position.
    pub actual: Point,
    /// Distance between the two.
    pub deviation: f64,
    /// Whether the snapped point lies in the region box.
    pub in_bounds: bool,
    /// `deviation <= allowed_deviation`.
    pub passed: bool,
}

/// Spacing between two consecutive teeth along the axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapCheck {
    /// Lower slot index; the gap runs to `slot + 1`.
    pub slot: usize,
    /// Measured gap.
    pub gap: f64,
    /// `|gap - S|`.
    pub deviation: f64,
}

/// Verdict for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    /// Region name.
    pub region: String,
    /// Configured tooth count.
    pub expected: usize,
    /// Planned tooth count.
    pub actual: usize,
    /// Nominal spacing `S`.
    pub spacing: f64,
    /// Configured tolerance fraction.
    pub tolerance_fraction: f64,
    /// Largest passing deviation: `(1 - tolerance_fraction) * S`.
    pub allowed_deviation: f64,
    /// Per-tooth verdicts.
    pub features: Vec<FeatureCheck>,
    /// Consecutive spacing.
    pub gaps: Vec<GapCheck>,
    /// Human-readable problems.
    pub issues: Vec<String>,
    /// Count matches, every tooth passes and every tooth is in bounds.
    pub passed: bool,
}

impl RegionReport {
    /// Largest per-tooth deviation, or 0 with no teeth.
    #[must_use]
    pub fn max_deviation(&self) -> f64 {
        self.features.iter().map(|f| f.deviation).fold(0.0, f64::max)
    }
}

/// Verdict for a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// One entry per configured region, in configuration order.
    pub regions: Vec<RegionReport>,
    /// Every region passed.
    pub passed: bool,
}

impl ValidationReport {
    /// All issues across regions, prefixed with the region name.
    #[must_use]
    pub fn issues(&self) -> Vec<String> {
        self.regions
            .iter()
            .flat_map(|r| r.issues.iter().map(move |i| format!("{}: {i}", r.region)))
            .collect()
    }

    /// Names of failing regions.
    #[must_use]
    pub fn failing_regions(&self) -> Vec<&str> {
        self.regions
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.region.as_str())
            .collect()
    }

    /// Render a short multi-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for r in &self.regions {
            let _ = writeln!(
                out,
                "{:<16} {} {}/{} teeth  S={:.4}  max dev={:.4} (allowed {:.4})",
                r.region,
                if r.passed { "PASS" } else { "FAIL" },
                r.actual,
                r.expected,
                r.spacing,
                r.max_deviation(),
                r.allowed_deviation,
            );
            for issue in &r.issues {
                let _ = writeln!(out, "    - {issue}");
            }
        }
        let _ = write!(
            out,
            "overall: {}",
            if self.passed { "PASS" } else { "FAIL" }
        );
        out
    }
}

/// Check each region's placements against its spec.
///
/// Specs are matched to results by region name; a spec with no result is
/// treated as having planned zero teeth.
#[must_use]
pub fn validate(
    specs: &[FeatureSpec],
    results: &[PlacementResult],
    tolerance_fraction: f64,
) -> ValidationReport {
    let regions: Vec<RegionReport> = specs
        .iter()
        .map(|spec| {
            let result = results.iter().find(|r| r.region == spec.name);
            validate_region(spec, result, tolerance_fraction)
        })
        .collect();
    let passed = regions.iter().all(|r| r.passed);
    if !passed {
        for r in regions.iter().filter(|r| !r.passed) {
            warn!(region = %r.region, issues = r.issues.len(), "validation failed");
        }
    }
    ValidationReport { regions, passed }
}

fn validate_region(
    spec: &FeatureSpec,
    result: Option<&PlacementResult>,
    tolerance_fraction: f64,
) -> RegionReport {
    let expected = spec.teeth;
    let placements = result.map_or(&[][..], |r| r.placements.as_slice());
    let spacing = result.map_or(0.0, |r| r.spacing);
    let bounds = result.map_or(spec.bounds, |r| r.bounds);
    let axis = result.map_or(spec.axis, |r| r.axis);
    let allowed = (1.0 - tolerance_fraction) * spacing;

    let mut issues = Vec::new();
    if placements.len() != expected {
        issues.push(format!(
            "expected {expected} teeth, found {}",
            placements.len()
        ));
    }

    let features: Vec<FeatureCheck> = placements
        .iter()
        .map(|p| {
            let in_bounds = bounds.contains(p.actual);
            if !in_bounds {
                issues.push(format!(
                    "slot {} at ({:.4}, {:.4}) is outside the region box",
                    p.slot, p.actual.x, p.actual.y
                ));
            }
            let passed = p.residual <= allowed;
            if !passed {
                issues.push(format!(
                    "slot {} deviates {:.4} in (allowed {allowed:.4})",
                    p.slot, p.residual
                ));
            }
            FeatureCheck {
                slot: p.slot,
                ideal: p.ideal,
                actual: p.actual,
                deviation: p.residual,
                in_bounds,
                passed,
            }
        })
        .collect();

    let gaps = placements
        .windows(2)
        .map(|w| {
            let gap = axis.along(w[1].actual) - axis.along(w[0].actual);
            GapCheck {
                slot: w[0].slot,
                gap,
                deviation: (gap - spacing).abs(),
            }
        })
        .collect();

    let passed = placements.len() == expected && features.iter().all(|f| f.passed && f.in_bounds);

    RegionReport {
        region: spec.name.clone(),
        expected,
        actual: placements.len(),
        spacing,
        tolerance_fraction,
        allowed_deviation: allowed,
        features,
        gaps,
        issues,
        passed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::FeaturePlacement;
    use crate::types::{Axis, BoundingBox, ContourId};

    fn spec(teeth: usize) -> FeatureSpec {
        FeatureSpec {
            name: "jaw".to_owned(),
            bounds: BoundingBox::new(0.0, 4.0, 0.0, 1.0),
            teeth,
            skip_front: 0.0,
            skip_back: 0.0,
            ..FeatureSpec::default()
        }
    }

    /// Ideal slots at x = 0, 2, 4 (S = 2) with the given x residuals.
    fn result(offsets: &[f64]) -> PlacementResult {
        PlacementResult {
            region: "jaw".to_owned(),
            bounds: BoundingBox::new(0.0, 4.0, 0.0, 1.0),
            axis: Axis::X,
            spacing: 2.0,
            target: ContourId(0),
            placements: offsets
                .iter()
                .enumerate()
                .map(|(i, &dx)| {
                    #[allow(clippy::cast_precision_loss)]
                    let x = 2.0 * i as f64;
                    let ideal = Point::new(x, 0.5);
                    let actual = Point::new((x + dx).clamp(0.0, 4.0), 0.5);
                    FeaturePlacement {
                        slot: i,
                        ideal,
                        actual,
                        residual: ideal.distance(actual),
                    }
                })
                .collect(),
        }
    }

    #[test]
    fn zero_residuals_pass() {
        let report = validate(&[spec(3)], &[result(&[0.0, 0.0, 0.0])], 0.70);
        assert!(report.passed);
        let r = &report.regions[0];
        assert!(r.max_deviation().abs() < f64::EPSILON);
        assert!(r.issues.is_empty());
        assert_eq!(r.gaps.len(), 2);
        assert!(r.gaps.iter().all(|g| g.deviation.abs() < 1e-12));
    }

    #[test]
    fn residual_over_thirty_percent_of_spacing_fails() {
        // S = 2, so the limit is 0.6.
        let report = validate(&[spec(3)], &[result(&[0.0, 0.61, 0.0])], 0.70);
        assert!(!report.passed);
        let r = &report.regions[0];
        assert!((r.allowed_deviation - 0.6).abs() < 1e-12);
        assert!(r.features[0].passed);
        assert!(!r.features[1].passed);
        assert!(r.features[2].passed);
        assert_eq!(report.failing_regions(), vec!["jaw"]);
    }

    #[test]
    fn residual_under_limit_passes() {
        let report = validate(&[spec(3)], &[result(&[0.0, 0.59, 0.0])], 0.70);
        assert!(report.passed);
    }

    #[test]
    fn count_mismatch_fails_with_issue() {
        let report = validate(&[spec(4)], &[result(&[0.0, 0.0, 0.0])], 0.70);
        assert!(!report.passed);
        assert_eq!(report.regions[0].expected, 4);
        assert_eq!(report.regions[0].actual, 3);
        assert!(report.issues()[0].contains("expected 4 teeth, found 3"));
    }

    #[test]
    fn out_of_bounds_fails_with_issue() {
        let mut r = result(&[0.0, 0.0, 0.0]);
        r.placements[2].actual = Point::new(4.0, 1.2);
        r.placements[2].residual = 0.0;
        let report = validate(&[spec(3)], &[r], 0.70);
        assert!(!report.passed);
        assert!(!report.regions[0].features[2].in_bounds);
        assert!(report.regions[0].issues[0].contains("outside the region box"));
    }

    #[test]
    fn zero_expected_zero_actual_is_trivial_pass() {
        let report = validate(&[spec(0)], &[result(&[])], 0.70);
        assert!(report.passed);
        let report = validate(&[spec(0)], &[], 0.70);
        assert!(report.passed);
    }

    #[test]
    fn missing_result_counts_as_zero() {
        let report = validate(&[spec(2)], &[], 0.70);
        assert!(!report.passed);
        assert_eq!(report.regions[0].actual, 0);
    }

    #[test]
    fn summary_mentions_each_region() {
        let report = validate(&[spec(3)], &[result(&[0.0, 0.0, 0.0])], 0.70);
        let text = report.summary();
        assert!(text.contains("jaw"));
        assert!(text.contains("PASS 3/3"));
        assert!(text.ends_with("overall: PASS"));
    }
}
