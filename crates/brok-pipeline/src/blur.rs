//! Gaussian blur for noise reduction before thresholding.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. Scanned or
//! JPEG-compressed artwork thresholds into ragged borders; a light blur
//! first keeps the traced contours smooth.

use image::GrayImage;

/// Apply Gaussian blur to a grayscale image.
///
/// Higher `sigma` values produce more smoothing. Non-positive sigma
/// returns the image unchanged; `imageproc` panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sigma_returns_input() {
        let img = GrayImage::from_fn(5, 5, |x, y| image::Luma([((x * 40 + y * 7) % 256) as u8]));
        assert_eq!(gaussian_blur(&img, 0.0), img);
        assert_eq!(gaussian_blur(&img, -1.0), img);
    }

    #[test]
    fn blur_softens_a_step() {
        let img = GrayImage::from_fn(20, 3, |x, _| image::Luma([if x < 10 { 0 } else { 255 }]));
        let blurred = gaussian_blur(&img, 2.0);
        let left = blurred.get_pixel(9, 1).0[0];
        let right = blurred.get_pixel(10, 1).0[0];
        assert!(left > 0, "dark side should lighten near the step");
        assert!(right < 255, "light side should darken near the step");
        assert_eq!(blurred.dimensions(), img.dimensions());
    }
}
