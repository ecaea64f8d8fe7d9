//! brok-pipeline: Pure raster-to-toolpath pipeline (sans-IO).
//!
//! Converts an image of a part outline into a plasma-cutter motion
//! program through:
//! extract -> plan (with bounded retry) -> validate -> enforce winding ->
//! order -> compile.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices and returns structured data. File handling
//! and text formats live in `brok-export` and the `brok` binary.

pub mod bevel;
pub mod blur;
pub mod compile;
pub mod config;
pub mod contour;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod grayscale;
pub mod order;
pub mod plan;
pub mod retry;
pub mod simplify;
pub mod skeleton;
pub mod toolpath;
pub mod types;
pub mod validate;

pub use bevel::{OrientedContour, Winding};
pub use compile::{CompileOptions, Tooth};
pub use config::{
    ExtractionConfig, FeatureSpec, MachineConfig, PipelineConfig, ProbeConfig, RetryPolicy,
    RingSpec, ToothDirection,
};
pub use error::{CompileError, ExtractionError, GeometryError, PipelineError, PlacementError};
pub use extract::Extraction;
pub use plan::{FeaturePlacement, PlacementResult};
pub use skeleton::{SkeletonBuilder, SkeletonKind, SkeletonPointSet};
pub use toolpath::{ArcDirection, MotionPrimitive, ToolpathProgram};
pub use types::{
    Axis, BoundingBox, Contour, ContourId, ContourKind, Dimensions, GrayImage, Point,
};
pub use validate::ValidationReport;

use tracing::info;

/// Everything a run produces.
///
/// A run that completes is not necessarily a run that passed: check
/// `report.passed` before trusting `program`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Contours and skeleton from the image.
    pub extraction: Extraction,
    /// Final placements, one per configured region.
    pub placements: Vec<PlacementResult>,
    /// Contours with enforced winding, in cutting order.
    pub contours: Vec<OrientedContour>,
    /// The compiled motion program.
    pub program: ToolpathProgram,
    /// Verdict on `placements`.
    pub report: ValidationReport,
    /// Planning attempts used, starting at 1.
    pub attempts: u32,
}

/// Run the full pipeline on encoded image bytes.
///
/// Takes raw image bytes (PNG, JPEG, BMP, WebP) and a configuration.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] before touching the image if
/// the configuration is out of range, [`PipelineError::EmptyInput`] if
/// `image_bytes` is empty, [`PipelineError::ImageDecode`] if the format
/// is unrecognized, and any stage error from [`process_image`].
pub fn process(image_bytes: &[u8], config: &PipelineConfig) -> Result<RunOutput, PipelineError> {
    config.validate()?;
    let gray = grayscale::decode_and_grayscale(image_bytes)?;
    run(&gray, config)
}

/// Run the full pipeline on an already decoded grayscale image.
///
/// # Pipeline steps
///
/// 1. Validate the configuration
/// 2. Extract the outer contour, holes and skeleton
/// 3. Plan and validate every region, re-planning failing regions with
///    widened boxes up to `config.retry.max_retries` times
/// 4. Enforce winding (outer CW, inner CCW)
/// 5. Order loops for cutting (holes first)
/// 6. Compile to motion primitives
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`],
/// [`PipelineError::Extraction`], [`PipelineError::Placement`] (only
/// once retries are spent), [`PipelineError::Geometry`] or
/// [`PipelineError::Compile`]. A failing validation is not an error.
pub fn process_image(gray: &GrayImage, config: &PipelineConfig) -> Result<RunOutput, PipelineError> {
    config.validate()?;
    run(gray, config)
}

fn run(gray: &GrayImage, config: &PipelineConfig) -> Result<RunOutput, PipelineError> {
    let extraction = extract::extract(gray, &config.extraction)?;
    let planned = retry::plan_with_retry(
        &config.regions,
        &extraction.skeleton,
        config.tolerance_fraction,
        &config.retry,
    )?;
    let contours = orient_and_order(&extraction, config)?;
    let program = compile_program(&contours, &planned.placements, config)?;

    info!(
        contours = contours.len(),
        primitives = program.len(),
        attempts = planned.attempts,
        passed = planned.report.passed,
        "pipeline finished"
    );

    Ok(RunOutput {
        extraction,
        placements: planned.placements,
        contours,
        program,
        report: planned.report,
        attempts: planned.attempts,
    })
}

/// Enforce winding on every extracted contour and put them in cutting
/// order, walking from the machine's home position.
pub(crate) fn orient_and_order(
    extraction: &Extraction,
    config: &PipelineConfig,
) -> Result<Vec<OrientedContour>, GeometryError> {
    let oriented = bevel::enforce_all(extraction.contours().cloned())?;
    let origin = config.machine.home.unwrap_or(Point::new(0.0, 0.0));
    Ok(order::order_for_cutting(oriented, origin))
}

/// Turn placements into teeth and compile everything.
pub(crate) fn compile_program(
    contours: &[OrientedContour],
    placements: &[PlacementResult],
    config: &PipelineConfig,
) -> Result<ToolpathProgram, CompileError> {
    let mut teeth: Vec<Tooth> = placements
        .iter()
        .filter_map(|result| {
            config
                .regions
                .iter()
                .find(|spec| spec.name == result.region)
                .map(|spec| Tooth::from_placements(result, spec))
        })
        .flatten()
        .collect();
    if config.extraction.skeleton == SkeletonKind::MedialAxis {
        compile::project_onto_targets(&mut teeth, contours);
    }

    let options = CompileOptions {
        machine: &config.machine,
        edge_tolerance: config.edge_tolerance,
    };
    compile::compile(contours, &teeth, config.ring.as_ref(), &options)
}
