//! Image decoding, grayscale conversion and binarisation.
//!
//! Raw bytes in, a clean material mask out: `255` marks material, `0`
//! marks background. The contour tracer and the thinning pass both read
//! this mask.

use image::{GrayImage, Luma};

use crate::error::PipelineError;

/// Mask value for material pixels.
pub const MATERIAL: u8 = 255;

/// Decode raw image bytes and convert to grayscale.
///
/// Supports PNG, JPEG, BMP, and WebP formats (whatever the `image` crate
/// can decode).
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_luma8())
}

/// Binarise `gray` into a material mask.
///
/// Dark pixels (`luma <= threshold`) are material unless `invert` is set,
/// in which case light pixels (`luma > threshold`) are.
#[must_use = "returns the material mask"]
pub fn threshold_mask(gray: &GrayImage, threshold: u8, invert: bool) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let dark = gray.get_pixel(x, y).0[0] <= threshold;
        if dark == invert {
            Luma([0])
        } else {
            Luma([MATERIAL])
        }
    })
}

/// Morphological close (dilate then erode) with a square structuring
/// element of the given radius. Radius 0 returns the mask unchanged.
#[must_use = "returns the closed mask"]
pub fn close_gaps(mask: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    imageproc::morphology::close(mask, imageproc::distance_transform::Norm::LInf, radius)
}
