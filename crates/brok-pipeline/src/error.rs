//! Error types for every pipeline stage.
//!
//! Each stage has its own enum so callers can match on the failure
//! kind; [`PipelineError`] wraps them all for the orchestrator.

use crate::types::ContourId;

/// The image could not be turned into usable contours or a skeleton.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The image has zero width or height.
    #[error("image has no pixels")]
    EmptyImage,

    /// No border qualified as the outer contour.
    #[error("no outer contour found in the image")]
    NoOuterContour,

    /// A kept contour collapsed below three points.
    #[error("contour {id} has {points} point(s) after simplification; at least 3 are required")]
    Degenerate {
        /// The offending contour.
        id: ContourId,
        /// How many points survived.
        points: usize,
    },

    /// Two non-adjacent edges of a contour cross.
    #[error("contour {id} self-intersects between edges {first} and {second}")]
    SelfIntersecting {
        /// The offending contour.
        id: ContourId,
        /// Index of the first crossing edge.
        first: usize,
        /// Index of the second crossing edge.
        second: usize,
    },

    /// Thinning or border sampling produced no points.
    #[error("skeleton point set is empty")]
    EmptySkeleton,
}

/// A region's teeth could not be snapped to the skeleton.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlacementError {
    /// The region box contains no skeleton points at all.
    #[error("region '{region}' contains no skeleton points")]
    NoCandidates {
        /// Region name.
        region: String,
    },

    /// The region box holds fewer skeleton points than requested teeth.
    #[error("region '{region}' has {available} skeleton point(s) for {requested} teeth")]
    TooFewCandidates {
        /// Region name.
        region: String,
        /// Skeleton points inside the box.
        available: usize,
        /// Configured tooth count.
        requested: usize,
    },

    /// Two slots resolved to the same skeleton point.
    #[error("region '{region}': slots {first} and {second} both snap to ({x:.4}, {y:.4})")]
    DuplicateSnap {
        /// Region name.
        region: String,
        /// Earlier slot index.
        first: usize,
        /// Later slot index.
        second: usize,
        /// Shared x coordinate.
        x: f64,
        /// Shared y coordinate.
        y: f64,
    },
}

impl PlacementError {
    /// Name of the region that failed.
    #[must_use]
    pub fn region(&self) -> &str {
        match self {
            Self::NoCandidates { region }
            | Self::TooFewCandidates { region, .. }
            | Self::DuplicateSnap { region, .. } => region,
        }
    }
}

/// A contour's orientation cannot be determined.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// Shoelace area is zero.
    #[error("contour {id} has zero signed area")]
    ZeroArea {
        /// The offending contour.
        id: ContourId,
    },
}

/// Oriented loops and placements could not be lowered to motion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// A contour has fewer than three points.
    #[error("contour {id} has {points} point(s); at least 3 are required")]
    TooFewPoints {
        /// The offending contour.
        id: ContourId,
        /// Point count.
        points: usize,
    },

    /// A tooth anchor is too far from every edge of its target contour.
    #[error(
        "region '{region}' slot {slot}: ({x:.4}, {y:.4}) is {distance:.4} in from contour {id}"
    )]
    OffEdge {
        /// Region name.
        region: String,
        /// Slot index.
        slot: usize,
        /// Target contour.
        id: ContourId,
        /// Anchor x.
        x: f64,
        /// Anchor y.
        y: f64,
        /// Distance to the nearest edge.
        distance: f64,
    },

    /// Two teeth on one contour claim overlapping stretches of the loop.
    #[error("contour {id}: teeth at arc length {first:.4} and {second:.4} overlap")]
    OverlappingTeeth {
        /// The contour.
        id: ContourId,
        /// Arc-length position of the earlier tooth.
        first: f64,
        /// Arc-length position of the later tooth.
        second: f64,
    },

    /// A placement names a contour that is not part of the program.
    #[error("region '{region}' targets contour {id}, which is not being compiled")]
    UnknownTarget {
        /// Region name.
        region: String,
        /// The missing contour.
        id: ContourId,
    },
}

/// Errors that can occur anywhere in the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The input image bytes were empty.
    #[error("empty input: no image data provided")]
    EmptyInput,

    /// The image could not be decoded.
    #[error("image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Contour or skeleton extraction failed.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Feature placement failed.
    #[error("placement failed: {0}")]
    Placement(#[from] PlacementError),

    /// Winding could not be enforced.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Toolpath compilation failed.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
}
