//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! Every call to [`process_with_diagnostics`] runs the same stages as
//! [`process`](crate::process) and records how long each took and what
//! it produced. Useful for tuning extraction and region settings against
//! a real drawing.
//!
//! Timestamps come from an injected [`Clock`] so the core stays free of
//! platform time sources; durations are plain [`std::time::Duration`]s.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::{RunOutput, extract, grayscale, retry};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic timestamps.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 0: image decoding and grayscale conversion.
    pub decode: StageDiagnostics,
    /// Stage 1: contour and skeleton extraction.
    pub extraction: StageDiagnostics,
    /// Stage 2: tooth planning, validation and retries.
    pub planning: StageDiagnostics,
    /// Stage 3: winding enforcement and cut ordering.
    pub enforcement: StageDiagnostics,
    /// Stage 4: toolpath compilation.
    pub compile: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Extraction metrics.
    Extraction {
        /// Kept holes.
        hole_count: usize,
        /// Points across the outer contour and holes after simplification.
        contour_point_count: usize,
        /// Snap candidates.
        skeleton_point_count: usize,
        /// Inches per pixel.
        scale: f64,
    },
    /// Planning metrics.
    Planning {
        /// Configured regions.
        region_count: usize,
        /// Teeth placed across all regions.
        placement_count: usize,
        /// Attempts used, starting at 1.
        attempts: u32,
        /// Regions that failed validation on the final attempt.
        failing_regions: Vec<String>,
    },
    /// Winding enforcement metrics.
    Enforcement {
        /// Loops oriented.
        contour_count: usize,
        /// Loops whose point order had to be reversed.
        reversed_count: usize,
    },
    /// Compilation metrics.
    Compile {
        /// Motion primitives emitted.
        primitive_count: usize,
        /// Torch firings.
        pierce_count: usize,
        /// Total cutting length in inches.
        cut_length: f64,
    },
}

/// High-level summary for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Loops in the program.
    pub contour_count: usize,
    /// Teeth in the program.
    pub tooth_count: usize,
    /// Motion primitives in the program.
    pub primitive_count: usize,
    /// Whether validation passed.
    pub passed: bool,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Extraction", &self.extraction),
            ("Planning", &self.planning),
            ("Enforcement", &self.enforcement),
            ("Compile", &self.compile),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Contours: {}  |  Teeth: {}  |  Primitives: {}  |  Validation: {}",
            self.summary.contour_count,
            self.summary.tooth_count,
            self.summary.primitive_count,
            if self.summary.passed { "PASS" } else { "FAIL" },
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => {
            format!("{input_bytes} bytes -> {width}x{height}")
        }
        StageMetrics::Extraction {
            hole_count,
            contour_point_count,
            skeleton_point_count,
            scale,
        } => {
            format!(
                "1 outer + {hole_count} holes, {contour_point_count} pts, skeleton={skeleton_point_count} ({scale:.4} in/px)",
            )
        }
        StageMetrics::Planning {
            region_count,
            placement_count,
            attempts,
            failing_regions,
        } => {
            let verdict = if failing_regions.is_empty() {
                "pass".to_owned()
            } else {
                format!("failing: {}", failing_regions.join(", "))
            };
            format!("{region_count} regions, {placement_count} teeth, attempts={attempts}, {verdict}")
        }
        StageMetrics::Enforcement {
            contour_count,
            reversed_count,
        } => format!("{contour_count} loops, {reversed_count} reversed"),
        StageMetrics::Compile {
            primitive_count,
            pierce_count,
            cut_length,
        } => {
            format!("{primitive_count} primitives, {pierce_count} pierces, cut={cut_length:.2}in")
        }
    }
}

/// Run [`process`](crate::process) while recording per-stage diagnostics.
///
/// # Errors
///
/// Same as [`process`](crate::process).
pub fn process_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &PipelineConfig,
    clock: &C,
) -> Result<(RunOutput, PipelineDiagnostics), PipelineError> {
    config.validate()?;
    let total_start = clock.now();

    // 0. Decode.
    let start = clock.now();
    let gray = grayscale::decode_and_grayscale(image_bytes)?;
    let (width, height) = (gray.width(), gray.height());
    let pixel_count = u64::from(width) * u64::from(height);
    let decode = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Decode {
            input_bytes: image_bytes.len(),
            width,
            height,
            pixel_count,
        },
    };

    // 1. Extract.
    let start = clock.now();
    let extraction = extract::extract(&gray, &config.extraction)?;
    let extraction_diag = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Extraction {
            hole_count: extraction.inners.len(),
            contour_point_count: extraction.contours().map(crate::Contour::len).sum(),
            skeleton_point_count: extraction.skeleton.len(),
            scale: extraction.frame.scale,
        },
    };

    // 2. Plan, validate, retry.
    let start = clock.now();
    let planned = retry::plan_with_retry(
        &config.regions,
        &extraction.skeleton,
        config.tolerance_fraction,
        &config.retry,
    )?;
    let tooth_count = planned.placements.iter().map(|r| r.placements.len()).sum();
    let planning = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Planning {
            region_count: config.regions.len(),
            placement_count: tooth_count,
            attempts: planned.attempts,
            failing_regions: planned
                .report
                .failing_regions()
                .into_iter()
                .map(str::to_owned)
                .collect(),
        },
    };

    // 3. Enforce winding and order.
    let start = clock.now();
    let contours = crate::orient_and_order(&extraction, config)?;
    let enforcement = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Enforcement {
            contour_count: contours.len(),
            reversed_count: contours.iter().filter(|c| c.was_reversed()).count(),
        },
    };

    // 4. Compile.
    let start = clock.now();
    let program = crate::compile_program(&contours, &planned.placements, config)?;
    let compile = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Compile {
            primitive_count: program.len(),
            pierce_count: program.pierce_count(),
            cut_length: program.cut_length(),
        },
    };

    let diagnostics = PipelineDiagnostics {
        decode,
        extraction: extraction_diag,
        planning,
        enforcement,
        compile,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary {
            image_width: width,
            image_height: height,
            pixel_count,
            contour_count: contours.len(),
            tooth_count,
            primitive_count: program.len(),
            passed: planned.report.passed,
        },
    };

    let output = RunOutput {
        extraction,
        placements: planned.placements,
        contours,
        program,
        report: planned.report,
        attempts: planned.attempts,
    };
    Ok((output, diagnostics))
}
