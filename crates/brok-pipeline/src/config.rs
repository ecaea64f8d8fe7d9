//! Pipeline configuration.
//!
//! Every struct derives serde with `#[serde(default)]` so a partial JSON
//! document fills the rest from [`Default`]. Call
//! [`PipelineConfig::validate`] once before running the pipeline; the
//! stages assume a validated configuration.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::skeleton::SkeletonKind;
use crate::types::{Axis, BoundingBox, ContourId, ContourKind, Point};

/// Default luma threshold separating material from background.
pub const DEFAULT_THRESHOLD: u8 = 50;

/// Default fraction of the nominal spacing a tooth may drift and still
/// be accepted: a tooth passes while its deviation stays within
/// `(1 - 0.70) * S`.
pub const DEFAULT_TOLERANCE_FRACTION: f64 = 0.70;

/// Top-level configuration for a full pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raster to contour settings.
    pub extraction: ExtractionConfig,

    /// Tooth regions, planned and validated independently.
    pub regions: Vec<FeatureSpec>,

    /// Torch heights, feeds and probing.
    pub machine: MachineConfig,

    /// Optional circular cut around the part (e.g. a medallion ring).
    pub ring: Option<RingSpec>,

    /// Share of the nominal spacing treated as the tolerance band.
    pub tolerance_fraction: f64,

    /// How far (inches) a snapped tooth may sit from its target contour's
    /// nearest edge before compilation rejects it.
    pub edge_tolerance: f64,

    /// Bounded re-planning with widened boxes.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            regions: vec![FeatureSpec::upper_jaw(), FeatureSpec::lower_jaw()],
            machine: MachineConfig::default(),
            ring: None,
            tolerance_fraction: DEFAULT_TOLERANCE_FRACTION,
            edge_tolerance: 0.05,
            retry: RetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Check every range constraint the stages rely on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.extraction.validate()?;
        self.machine.validate()?;

        if !in_unit_interval(self.tolerance_fraction) {
            return Err(invalid(format!(
                "tolerance_fraction must be in (0, 1], got {}",
                self.tolerance_fraction
            )));
        }
        if self.edge_tolerance.is_nan() || self.edge_tolerance < 0.0 {
            return Err(invalid(format!(
                "edge_tolerance must be non-negative, got {}",
                self.edge_tolerance
            )));
        }
        if [self.retry.widen_x, self.retry.widen_y]
            .iter()
            .any(|w| w.is_nan() || *w < 0.0)
        {
            return Err(invalid("retry widening must be non-negative".to_owned()));
        }

        for (i, region) in self.regions.iter().enumerate() {
            region.validate()?;
            if self.regions[..i].iter().any(|r| r.name == region.name) {
                return Err(invalid(format!("duplicate region name '{}'", region.name)));
            }
        }

        // Boundary snaps sit on the unsimplified border; the compiler checks
        // them against the simplified loop.
        if self.extraction.skeleton == SkeletonKind::Boundary
            && self.regions.iter().any(|r| r.teeth > 0)
            && self.extraction.simplify_tolerance > self.edge_tolerance
        {
            return Err(invalid(format!(
                "simplify_tolerance ({}) must not exceed edge_tolerance ({}) when boundary snaps place teeth",
                self.extraction.simplify_tolerance, self.edge_tolerance
            )));
        }

        if let Some(ring) = &self.ring {
            if !is_positive(ring.diameter) {
                return Err(invalid(format!(
                    "ring diameter must be positive, got {}",
                    ring.diameter
                )));
            }
            if ring.lead_in.is_nan() || ring.lead_in < 0.0 {
                return Err(invalid(format!(
                    "ring lead_in must be non-negative, got {}",
                    ring.lead_in
                )));
            }
        }

        Ok(())
    }
}

fn invalid(msg: String) -> PipelineError {
    PipelineError::InvalidConfig(msg)
}

/// False for NaN.
fn is_positive(v: f64) -> bool {
    v > 0.0
}

/// `(0, 1]`; false for NaN.
fn in_unit_interval(v: f64) -> bool {
    v > 0.0 && v <= 1.0
}

/// Raster to contour settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Pixels with luma at or below this value are material.
    pub threshold: u8,

    /// Treat light pixels as material instead of dark ones.
    pub invert: bool,

    /// Gaussian blur sigma applied before thresholding. 0 disables.
    pub blur_sigma: f32,

    /// Morphological close radius (pixels) applied to the mask. 0 disables.
    pub close_radius: u8,

    /// How the skeleton point set is derived.
    pub skeleton: SkeletonKind,

    /// Length in inches of the image's longest side after scaling.
    pub fit_size: f64,

    /// Workspace position of the image centre.
    pub center: Point,

    /// RDP tolerance in inches. 0 keeps every traced point.
    pub simplify_tolerance: f64,

    /// Holes with less area (square inches) are dropped as specks.
    pub min_hole_area: f64,

    /// Holes wider or taller than this (inches) are dropped.
    pub max_hole_extent: Option<f64>,

    /// Top-level borders at least this circular cannot be the outer
    /// contour. Useful when the artwork carries a printed ring.
    pub max_outer_circularity: Option<f64>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            invert: false,
            blur_sigma: 0.0,
            close_radius: 1,
            skeleton: SkeletonKind::default(),
            fit_size: 11.5,
            center: Point::new(6.75, 6.75),
            simplify_tolerance: 0.01,
            min_hole_area: 0.005,
            max_hole_extent: None,
            max_outer_circularity: None,
        }
    }
}

impl ExtractionConfig {
    fn validate(&self) -> Result<(), PipelineError> {
        if !is_positive(self.fit_size) {
            return Err(invalid(format!(
                "fit_size must be positive, got {}",
                self.fit_size
            )));
        }
        if self.blur_sigma.is_nan() || self.blur_sigma < 0.0 {
            return Err(invalid(format!(
                "blur_sigma must be non-negative, got {}",
                self.blur_sigma
            )));
        }
        if self.simplify_tolerance.is_nan() || self.simplify_tolerance < 0.0 {
            return Err(invalid(format!(
                "simplify_tolerance must be non-negative, got {}",
                self.simplify_tolerance
            )));
        }
        if self.min_hole_area.is_nan() || self.min_hole_area < 0.0 {
            return Err(invalid(format!(
                "min_hole_area must be non-negative, got {}",
                self.min_hole_area
            )));
        }
        if let Some(extent) = self.max_hole_extent
            && !is_positive(extent)
        {
            return Err(invalid(format!(
                "max_hole_extent must be positive, got {extent}"
            )));
        }
        if let Some(c) = self.max_outer_circularity
            && !in_unit_interval(c)
        {
            return Err(invalid(format!(
                "max_outer_circularity must be in (0, 1], got {c}"
            )));
        }
        Ok(())
    }
}

/// Which way a tooth tip points from its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToothDirection {
    /// Toward +y.
    Up,
    /// Toward -y.
    #[default]
    Down,
    /// Toward -x.
    Left,
    /// Toward +x.
    Right,
}

impl ToothDirection {
    /// Unit vector for the tip direction.
    #[must_use]
    pub const fn unit(self) -> (f64, f64) {
        match self {
            Self::Up => (0.0, 1.0),
            Self::Down => (0.0, -1.0),
            Self::Left => (-1.0, 0.0),
            Self::Right => (1.0, 0.0),
        }
    }
}

/// A named region along which teeth are evenly distributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSpec {
    /// Unique region name, used in logs and reports.
    pub name: String,

    /// Search box in inches.
    pub bounds: BoundingBox,

    /// Direction of travel for slot spacing.
    pub axis: Axis,

    /// Number of teeth. 0 plans nothing.
    pub teeth: usize,

    /// Distance trimmed from the low end of the travel extent.
    pub skip_front: f64,

    /// Distance trimmed from the high end of the travel extent.
    pub skip_back: f64,

    /// Tooth base width along the contour (inches).
    pub tooth_width: f64,

    /// Tooth tip height (inches).
    pub tooth_height: f64,

    /// Tip direction.
    pub tooth_direction: ToothDirection,

    /// Contour receiving the teeth. The extractor always numbers the outer
    /// contour `ContourId(0)`.
    pub target: ContourId,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            bounds: BoundingBox::new(0.0, 1.0, 0.0, 1.0),
            axis: Axis::X,
            teeth: 0,
            skip_front: 0.10,
            skip_back: 0.20,
            tooth_width: 0.40,
            tooth_height: 0.52,
            tooth_direction: ToothDirection::Down,
            target: ContourId(0),
        }
    }
}

impl FeatureSpec {
    /// Upper jaw of the stock dinosaur-head part: seven teeth pointing down.
    #[must_use]
    pub fn upper_jaw() -> Self {
        Self {
            name: "upper_jaw".to_owned(),
            bounds: BoundingBox::new(9.5, 11.5, 8.5, 9.5),
            teeth: 7,
            tooth_direction: ToothDirection::Down,
            ..Self::default()
        }
    }

    /// Lower jaw of the stock dinosaur-head part: four teeth pointing up.
    #[must_use]
    pub fn lower_jaw() -> Self {
        Self {
            name: "lower_jaw".to_owned(),
            bounds: BoundingBox::new(9.5, 11.3, 7.0, 7.6),
            teeth: 4,
            tooth_direction: ToothDirection::Up,
            ..Self::default()
        }
    }

    /// Usable `[start, end]` along the axis after trimming the skips.
    #[must_use]
    pub fn span(&self) -> (f64, f64) {
        let (lo, hi) = self.bounds.extent(self.axis);
        (lo + self.skip_front, hi - self.skip_back)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.name.is_empty() {
            return Err(invalid("region name must not be empty".to_owned()));
        }
        if !self.bounds.is_well_formed() {
            return Err(invalid(format!(
                "region '{}': bounds need min < max on both axes",
                self.name
            )));
        }
        if self.skip_front < 0.0 || self.skip_back < 0.0 {
            return Err(invalid(format!(
                "region '{}': skips must be non-negative",
                self.name
            )));
        }
        if self.teeth > 0 {
            let (start, end) = self.span();
            if !is_positive(end - start) {
                return Err(invalid(format!(
                    "region '{}': skips leave no usable span",
                    self.name
                )));
            }
            if !(is_positive(self.tooth_width) && is_positive(self.tooth_height)) {
                return Err(invalid(format!(
                    "region '{}': tooth width and height must be positive",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Initial height sensing parameters (probe cycle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Depth to seek toward while probing down.
    pub seek_depth: f64,
    /// Feed while seeking.
    pub seek_feed: f64,
    /// Height at which the probe releases on the way back up.
    pub release_height: f64,
    /// Feed while releasing.
    pub release_feed: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            seek_depth: -5.0,
            seek_feed: 50.0,
            release_height: 0.5,
            release_feed: 25.0,
        }
    }
}

/// Torch heights, feeds and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Cutting feed rate (inches per minute).
    pub feed_rate: f64,
    /// Height above the plate at which the arc is struck.
    pub pierce_height: f64,
    /// Height above the plate while cutting.
    pub cut_height: f64,
    /// Travel height between cuts.
    pub safe_height: f64,
    /// Seconds to hold at pierce height after the torch fires.
    pub pierce_dwell: f64,
    /// Probe cycle parameters.
    pub probe: ProbeConfig,
    /// Scrap-side lead-in length (inches). 0 pierces on the contour.
    pub lead_in: f64,
    /// Extra travel past the start point when closing a loop (inches).
    pub overcut: f64,
    /// Where to park after the last cut.
    pub home: Option<Point>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            feed_rate: 47.0,
            pierce_height: 0.148,
            cut_height: 0.059,
            safe_height: 1.0,
            pierce_dwell: 0.70,
            probe: ProbeConfig::default(),
            lead_in: 0.15,
            overcut: 0.0,
            home: Some(Point::new(0.0, 0.0)),
        }
    }
}

impl MachineConfig {
    fn validate(&self) -> Result<(), PipelineError> {
        let positive = [
            ("feed_rate", self.feed_rate),
            ("pierce_height", self.pierce_height),
            ("cut_height", self.cut_height),
            ("pierce_dwell", self.pierce_dwell),
            ("probe.seek_feed", self.probe.seek_feed),
            ("probe.release_feed", self.probe.release_feed),
        ];
        for (name, value) in positive {
            if !is_positive(value) {
                return Err(invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if self.pierce_height <= self.cut_height {
            return Err(invalid(format!(
                "pierce_height ({}) must exceed cut_height ({})",
                self.pierce_height, self.cut_height
            )));
        }
        if self.safe_height < self.pierce_height {
            return Err(invalid(format!(
                "safe_height ({}) must be at least pierce_height ({})",
                self.safe_height, self.pierce_height
            )));
        }
        if self.lead_in.is_nan() || self.lead_in < 0.0 {
            return Err(invalid(format!(
                "lead_in must be non-negative, got {}",
                self.lead_in
            )));
        }
        if self.overcut.is_nan() || self.overcut < 0.0 {
            return Err(invalid(format!(
                "overcut must be non-negative, got {}",
                self.overcut
            )));
        }
        Ok(())
    }
}

/// A circular cut compiled as a single full-circle arc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingSpec {
    /// Circle centre in inches.
    pub center: Point,
    /// Circle diameter in inches.
    pub diameter: f64,
    /// Outer rings are cut clockwise, inner rings counter-clockwise.
    pub kind: ContourKind,
    /// Distance left of the start point at which the torch pierces.
    pub lead_in: f64,
}

impl Default for RingSpec {
    fn default() -> Self {
        Self {
            center: Point::new(6.75, 6.75),
            diameter: 12.0,
            kind: ContourKind::Outer,
            lead_in: 0.25,
        }
    }
}

/// Bounded re-planning policy used by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra attempts after the first.
    pub max_retries: u32,
    /// Inches added to the left and right of a failing box per retry.
    pub widen_x: f64,
    /// Inches added to the top and bottom of a failing box per retry.
    pub widen_y: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            widen_x: 0.5,
            widen_y: 0.3,
        }
    }
}
