//! Bounded re-planning with widened region boxes.
//!
//! Every attempt plans all regions and validates the result. Regions that
//! failed to plan or failed validation get their box grown by the policy
//! amounts before the next attempt; passing regions keep theirs.

use tracing::{info, warn};

use crate::config::{FeatureSpec, RetryPolicy};
use crate::error::PlacementError;
use crate::plan::{self, PlacementResult};
use crate::skeleton::SkeletonPointSet;
use crate::types::BoundingBox;
use crate::validate::{self, ValidationReport};

/// Placements from the last attempt together with their verdict.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// One result per configured region, in configuration order.
    pub placements: Vec<PlacementResult>,
    /// Verdict on `placements`. May be failing once retries run out.
    pub report: ValidationReport,
    /// Attempts made, starting at 1.
    pub attempts: u32,
}

/// Plan and validate every region, retrying failing regions with wider
/// boxes up to `policy.max_retries` times.
///
/// # Errors
///
/// Returns the first region's [`PlacementError`] (in configuration order)
/// when planning still fails on the last attempt. A failing validation on
/// the last attempt is not an error: the outcome carries the report.
pub fn plan_with_retry(
    specs: &[FeatureSpec],
    skeleton: &SkeletonPointSet,
    tolerance_fraction: f64,
    policy: &RetryPolicy,
) -> Result<PlanOutcome, PlacementError> {
    let mut bounds: Vec<BoundingBox> = specs.iter().map(|s| s.bounds).collect();
    let max_attempts = policy.max_retries.saturating_add(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        let results: Vec<Result<PlacementResult, PlacementError>> = specs
            .iter()
            .zip(&bounds)
            .map(|(spec, b)| plan::plan_region(spec, b, skeleton))
            .collect();

        let last = attempts >= max_attempts;
        let mut failing: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_err())
            .map(|(i, _)| i)
            .collect();

        if failing.is_empty() {
            let placements: Vec<PlacementResult> = results.into_iter().flatten().collect();
            let report = validate::validate(specs, &placements, tolerance_fraction);
            if report.passed || last {
                info!(attempts, passed = report.passed, "planning finished");
                return Ok(PlanOutcome {
                    placements,
                    report,
                    attempts,
                });
            }
            failing = report
                .regions
                .iter()
                .enumerate()
                .filter(|(_, r)| !r.passed)
                .map(|(i, _)| i)
                .collect();
        } else if last {
            let first = results.into_iter().find_map(Result::err);
            if let Some(err) = first {
                return Err(err);
            }
        }

        for &i in &failing {
            bounds[i] = bounds[i].widened(policy.widen_x, policy.widen_y);
            warn!(
                region = %specs[i].name,
                attempt = attempts,
                x_min = bounds[i].x_min,
                x_max = bounds[i].x_max,
                y_min = bounds[i].y_min,
                y_max = bounds[i].y_max,
                "retrying region with widened box"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn skeleton(points: &[(f64, f64)]) -> SkeletonPointSet {
        SkeletonPointSet::new(points.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    fn spec(name: &str, bounds: BoundingBox, teeth: usize) -> FeatureSpec {
        FeatureSpec {
            name: name.to_owned(),
            bounds,
            teeth,
            skip_front: 0.0,
            skip_back: 0.0,
            ..FeatureSpec::default()
        }
    }

    fn same_box(a: &BoundingBox, b: &BoundingBox) -> bool {
        [
            a.x_min - b.x_min,
            a.x_max - b.x_max,
            a.y_min - b.y_min,
            a.y_max - b.y_max,
        ]
        .iter()
        .all(|d| d.abs() < 1e-9)
    }

    #[test]
    fn passing_first_attempt() {
        let specs = [FeatureSpec {
            name: "jaw".to_owned(),
            bounds: BoundingBox::new(9.5, 11.5, 8.5, 9.5),
            teeth: 4,
            ..FeatureSpec::default()
        }];
        let sk = skeleton(&[(9.6, 9.0), (10.2, 9.0), (10.8, 9.0), (11.2, 9.0)]);
        let outcome = plan_with_retry(&specs, &sk, 0.70, &RetryPolicy::default()).unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.report.passed);
        assert_eq!(outcome.placements[0].placements.len(), 4);
    }

    #[test]
    fn widening_recovers_missing_candidate() {
        let specs = [spec("jaw", BoundingBox::new(0.0, 2.0, 0.0, 1.0), 2)];
        let sk = skeleton(&[(0.0, 0.5), (2.3, 0.5)]);
        let outcome = plan_with_retry(&specs, &sk, 0.70, &RetryPolicy::default()).unwrap();
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.report.passed);
        let result = &outcome.placements[0];
        assert!(same_box(&result.bounds, &BoundingBox::new(-0.5, 2.5, -0.3, 1.3)));
        assert_eq!(result.placements[1].actual, Point::new(2.3, 0.5));
    }

    #[test]
    fn placement_error_after_budget() {
        let specs = [spec("jaw", BoundingBox::new(0.0, 2.0, 0.0, 1.0), 2)];
        let sk = skeleton(&[(0.0, 0.5), (2.3, 0.5)]);
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let err = plan_with_retry(&specs, &sk, 0.70, &policy).unwrap_err();
        assert!(matches!(
            err,
            PlacementError::TooFewCandidates {
                available: 1,
                requested: 2,
                ..
            }
        ));
    }

    #[test]
    fn failing_report_is_returned_after_budget() {
        let specs = [
            spec("good", BoundingBox::new(0.0, 4.0, 4.0, 5.0), 2),
            spec("bad", BoundingBox::new(0.0, 4.0, 0.0, 1.0), 3),
        ];
        let sk = skeleton(&[
            (0.0, 4.5),
            (4.0, 4.5),
            (0.0, 0.5),
            (0.2, 0.5),
            (4.0, 0.5),
        ]);
        let outcome = plan_with_retry(&specs, &sk, 0.70, &RetryPolicy::default()).unwrap();
        assert_eq!(outcome.attempts, 3);
        assert!(!outcome.report.passed);
        assert_eq!(outcome.report.failing_regions(), vec!["bad"]);
        assert_eq!(outcome.placements[0].bounds, specs[0].bounds);
        assert!(same_box(
            &outcome.placements[1].bounds,
            &BoundingBox::new(-1.0, 5.0, -0.6, 1.6)
        ));
    }

    #[test]
    fn no_regions_is_a_trivial_pass() {
        let sk = skeleton(&[(0.0, 0.0)]);
        let outcome = plan_with_retry(&[], &sk, 0.70, &RetryPolicy::default()).unwrap();
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.report.passed);
        assert!(outcome.placements.is_empty());
    }
}
