//! Raster QC overlay.
//!
//! Draws a [`QcScene`] into an RGBA image with `tiny-skia`: light grid,
//! region boxes, skeleton dots, extracted contours, the compiled toolpath
//! (cuts solid, rapids thin), hollow ideal slots and filled teeth. A
//! coloured frame marks the validation verdict.
//!
//! Pure: returns an [`RgbaImage`]; callers encode it however they like
//! (see [`encode_png`]).

use image::{Rgba, RgbaImage};
use tiny_skia::{
    FillRule, LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

use crate::scene::QcScene;

/// Rendering options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QcStyle {
    /// Output resolution in pixels per inch.
    pub pixels_per_inch: f64,
    /// Marker radius for slots and teeth, in pixels.
    pub marker_radius: f32,
}

impl Default for QcStyle {
    fn default() -> Self {
        Self {
            pixels_per_inch: 60.0,
            marker_radius: 4.0,
        }
    }
}

type Color = (u8, u8, u8, u8);

const BACKGROUND: Color = (255, 255, 255, 255);
const GRID: Color = (220, 220, 220, 255);
const REGION: Color = (255, 160, 0, 255);
const SKELETON: Color = (150, 150, 150, 255);
const CONTOUR: Color = (40, 90, 200, 255);
const CUT: Color = (200, 30, 30, 255);
const RAPID: Color = (30, 160, 30, 180);
const IDEAL: Color = (120, 0, 160, 255);
const TOOTH: Color = (0, 0, 0, 255);
const PASS: Color = (30, 160, 30, 255);
const FAIL: Color = (200, 30, 30, 255);

/// Render the overlay.
///
/// Returns `None` if the scene is too large to allocate.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn render_qc(scene: &QcScene, style: &QcStyle) -> Option<RgbaImage> {
    let ppi = style.pixels_per_inch;
    let (w_in, h_in) = scene.size();
    let width = (w_in * ppi).ceil().max(1.0) as u32;
    let height = (h_in * ppi).ceil().max(1.0) as u32;

    let mut pixmap = Pixmap::new(width, height)?;
    pixmap.fill(tiny_skia::Color::from_rgba8(
        BACKGROUND.0,
        BACKGROUND.1,
        BACKGROUND.2,
        BACKGROUND.3,
    ));

    let mut canvas = Canvas {
        pixmap: &mut pixmap,
        scene,
        ppi,
    };

    let (xs, ys) = scene.grid_lines();
    for x in xs {
        canvas.segment((x, scene.view.y_min), (x, scene.view.y_max), GRID, 1.0);
    }
    for y in ys {
        canvas.segment((scene.view.x_min, y), (scene.view.x_max, y), GRID, 1.0);
    }

    for (_, b) in &scene.regions {
        let corners = [
            (b.x_min, b.y_min),
            (b.x_max, b.y_min),
            (b.x_max, b.y_max),
            (b.x_min, b.y_max),
        ];
        canvas.polyline(&corners, true, REGION, 1.5);
    }

    for p in &scene.skeleton {
        canvas.dot((p.x, p.y), 1.0, SKELETON);
    }

    for contour in &scene.contours {
        let pts: Vec<(f64, f64)> = contour.iter().map(|p| (p.x, p.y)).collect();
        canvas.polyline(&pts, true, CONTOUR, 1.0);
    }

    for (a, b) in &scene.rapids {
        canvas.segment((a.x, a.y), (b.x, b.y), RAPID, 0.75);
    }
    for cut in &scene.cuts {
        let pts: Vec<(f64, f64)> = cut.iter().map(|p| (p.x, p.y)).collect();
        canvas.polyline(&pts, false, CUT, 2.0);
    }

    for p in &scene.ideals {
        canvas.ring((p.x, p.y), style.marker_radius, IDEAL);
    }
    for p in &scene.teeth {
        canvas.dot((p.x, p.y), style.marker_radius * 0.6, TOOTH);
    }

    let verdict = if scene.passed { PASS } else { FAIL };
    canvas.frame(verdict, 6.0);

    Some(to_rgba_image(&pixmap))
}

/// Encode an RGBA image as PNG bytes.
///
/// # Errors
///
/// Returns the encoder's error if PNG encoding fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

/// Drawing helpers bound to one pixmap and scene transform.
struct Canvas<'a> {
    pixmap: &'a mut Pixmap,
    scene: &'a QcScene,
    ppi: f64,
}

impl Canvas<'_> {
    #[allow(clippy::cast_possible_truncation)]
    fn px(&self, (x, y): (f64, f64)) -> (f32, f32) {
        let (ix, iy) = self
            .scene
            .to_image(brok_pipeline::Point::new(x, y), self.ppi);
        (ix as f32, iy as f32)
    }

    fn segment(&mut self, a: (f64, f64), b: (f64, f64), color: Color, width: f32) {
        self.polyline(&[a, b], false, color, width);
    }

    fn polyline(&mut self, points: &[(f64, f64)], close: bool, color: Color, width: f32) {
        let mut pb = PathBuilder::new();
        let mut iter = points.iter().map(|&p| self.px(p));
        let Some((x0, y0)) = iter.next() else {
            return;
        };
        pb.move_to(x0, y0);
        for (x, y) in iter {
            pb.line_to(x, y);
        }
        if close {
            pb.close();
        }
        let Some(path) = pb.finish() else {
            return;
        };
        let stroke = Stroke {
            width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint(color), &stroke, Transform::identity(), None);
    }

    fn dot(&mut self, center: (f64, f64), radius: f32, color: Color) {
        let (cx, cy) = self.px(center);
        let Some(path) = PathBuilder::from_circle(cx, cy, radius) else {
            return;
        };
        self.pixmap.fill_path(
            &path,
            &paint(color),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }

    fn ring(&mut self, center: (f64, f64), radius: f32, color: Color) {
        let (cx, cy) = self.px(center);
        let Some(path) = PathBuilder::from_circle(cx, cy, radius) else {
            return;
        };
        let stroke = Stroke {
            width: 1.5,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint(color), &stroke, Transform::identity(), None);
    }

    #[allow(clippy::cast_precision_loss)]
    fn frame(&mut self, color: Color, width: f32) {
        let w = self.pixmap.width() as f32;
        let h = self.pixmap.height() as f32;
        let half = width / 2.0;
        let Some(rect) = Rect::from_ltrb(half, half, w - half, h - half) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint(color), &stroke, Transform::identity(), None);
    }
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.0, color.1, color.2, color.3);
    paint.anti_alias = true;
    paint
}

/// Convert the pixmap (premultiplied RGBA) to an `RgbaImage` (straight RGBA).
#[allow(clippy::cast_possible_truncation)]
fn to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let data = pixmap.data();
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (i, pixel) in img.pixels_mut().enumerate() {
        let off = i * 4;
        let a = data[off + 3];
        if a == 0 {
            *pixel = Rgba([0, 0, 0, 0]);
        } else {
            let r = u16::from(data[off]) * 255 / u16::from(a);
            let g = u16::from(data[off + 1]) * 255 / u16::from(a);
            let b = u16::from(data[off + 2]) * 255 / u16::from(a);
            *pixel = Rgba([r as u8, g as u8, b as u8, a]);
        }
    }
    img
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brok_pipeline::{BoundingBox, Point};

    use super::*;

    fn scene(passed: bool) -> QcScene {
        QcScene {
            view: BoundingBox::new(0.0, 2.0, 0.0, 1.0),
            regions: vec![("jaw".to_owned(), BoundingBox::new(0.5, 1.5, 0.25, 0.75))],
            skeleton: vec![Point::new(1.0, 0.5)],
            contours: vec![vec![
                Point::new(0.25, 0.25),
                Point::new(1.75, 0.25),
                Point::new(1.75, 0.75),
                Point::new(0.25, 0.75),
            ]],
            cuts: vec![vec![Point::new(0.25, 0.25), Point::new(1.75, 0.25)]],
            rapids: vec![(Point::new(0.0, 0.0), Point::new(0.25, 0.25))],
            ideals: vec![Point::new(1.0, 0.5)],
            teeth: vec![Point::new(1.0, 0.5)],
            passed,
        }
    }

    #[test]
    fn image_size_follows_view_and_resolution() {
        let img = render_qc(&scene(true), &QcStyle::default()).unwrap();
        assert_eq!(img.dimensions(), (120, 60));
    }

    #[test]
    fn frame_colour_reflects_verdict() {
        let pass = render_qc(&scene(true), &QcStyle::default()).unwrap();
        let fail = render_qc(&scene(false), &QcStyle::default()).unwrap();
        let Rgba([r, g, _, _]) = *pass.get_pixel(3, 30);
        assert!(g > r);
        let Rgba([r, g, _, _]) = *fail.get_pixel(3, 30);
        assert!(r > g);
    }

    #[test]
    fn cut_is_drawn() {
        let img = render_qc(&scene(true), &QcStyle::default()).unwrap();
        // Cut along y = 0.25 in: image row (1.0 - 0.25) * 60 = 45.
        let Rgba([r, g, b, _]) = *img.get_pixel(60, 45);
        assert!(r > 150 && g < 100 && b < 100, "got {r},{g},{b}");
    }

    #[test]
    fn oversized_scene_is_not_rendered() {
        let huge = QcScene {
            view: BoundingBox::new(0.0, 1e8, 0.0, 1.0),
            ..scene(true)
        };
        assert!(render_qc(&huge, &QcStyle::default()).is_none());
    }

    #[test]
    fn png_encoding_produces_signature() {
        let img = render_qc(&scene(true), &QcStyle::default()).unwrap();
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
