//! brok-export: Pure format serializers (sans-IO)
//!
//! Converts pipeline output into files an operator uses: G-code for the
//! plasma table, and a QC overlay as a raster image or an SVG sheet.

pub mod gcode;
pub mod qc;
pub mod scene;
pub mod svg;

pub use gcode::{GcodeMetadata, to_gcode};
pub use qc::{QcStyle, encode_png, render_qc};
pub use scene::QcScene;
pub use svg::{SvgMetadata, to_qc_svg};
