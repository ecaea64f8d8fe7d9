//! SVG QC sheet serializer.
//!
//! Renders the same layers as the raster overlay into an SVG document
//! using the [`svg`] crate for document construction, XML escaping, and
//! path data formatting. The `viewBox` is in inches with y pointing down,
//! so the document prints at true size.
//!
//! Each layer is a `<g>` with an `id` (`grid`, `regions`, `skeleton`,
//! `contours`, `rapids`, `cuts`, `ideals`, `teeth`) so the sheet can be
//! inspected or restyled in an editor.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{
    Circle, Description, Group, Line, Path, Rectangle, Text as TextElement, Title,
};
use svg::node::{Text, Value};

use brok_pipeline::Point;

use crate::scene::QcScene;

/// Metadata to embed in the SVG document.
///
/// Both fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title -- emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description -- emitted as `<desc>`.
    pub description: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from workspace points.
///
/// Uses `M` for the first point and `L` for the rest, flipping y about
/// `y_top` and shifting x by `x_left`. Appends `Z` when `close` is set.
/// Returns an empty string for fewer than 2 points.
#[must_use]
pub fn build_path_data(points: &[Point], x_left: f64, y_top: f64, close: bool) -> String {
    if points.len() < 2 {
        return String::new();
    }
    let tx = |p: &Point| (p.x - x_left, y_top - p.y);

    let mut data = Data::new().move_to(tx(&points[0]));
    for p in &points[1..] {
        data = data.line_to(tx(p));
    }
    if close {
        data = data.close();
    }
    String::from(Value::from(data))
}

/// Serialize a QC scene into an SVG string.
///
/// # Examples
///
/// ```
/// use brok_export::scene::QcScene;
/// use brok_export::svg::{SvgMetadata, to_qc_svg};
/// use brok_pipeline::{BoundingBox, Point};
///
/// let scene = QcScene {
///     view: BoundingBox::new(0.0, 2.0, 0.0, 1.0),
///     regions: Vec::new(),
///     skeleton: Vec::new(),
///     contours: vec![vec![
///         Point::new(0.5, 0.5),
///         Point::new(1.5, 0.5),
///         Point::new(1.5, 0.75),
///     ]],
///     cuts: Vec::new(),
///     rapids: Vec::new(),
///     ideals: Vec::new(),
///     teeth: Vec::new(),
///     passed: true,
/// };
/// let metadata = SvgMetadata { title: Some("brok"), ..SvgMetadata::default() };
/// let svg = to_qc_svg(&scene, &metadata);
/// assert!(svg.contains("<title>brok</title>"));
/// assert!(svg.contains("M0.5,0.5 L1.5,0.5 L1.5,0.25 z"));
/// ```
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn to_qc_svg(scene: &QcScene, metadata: &SvgMetadata<'_>) -> String {
    let (w, h) = scene.size();
    let x_left = scene.view.x_min;
    let y_top = scene.view.y_max;
    let tx = |p: Point| (p.x - x_left, y_top - p.y);

    let mut doc = Document::new()
        .set("width", format!("{w}in"))
        .set("height", format!("{h}in"))
        .set("viewBox", (0.0, 0.0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    doc = doc.add(
        Rectangle::new()
            .set("width", w)
            .set("height", h)
            .set("fill", "white"),
    );

    // Grid.
    let (xs, ys) = scene.grid_lines();
    let mut grid = Group::new()
        .set("id", "grid")
        .set("stroke", "#dcdcdc")
        .set("stroke-width", 0.01);
    for x in xs {
        grid = grid.add(line(
            tx(Point::new(x, scene.view.y_min)),
            tx(Point::new(x, scene.view.y_max)),
        ));
    }
    for y in ys {
        grid = grid.add(line(
            tx(Point::new(scene.view.x_min, y)),
            tx(Point::new(scene.view.x_max, y)),
        ));
    }
    doc = doc.add(grid);

    // Region boxes with labels.
    let mut regions = Group::new()
        .set("id", "regions")
        .set("stroke", "orange")
        .set("stroke-width", 0.02)
        .set("fill", "none");
    for (name, b) in &scene.regions {
        let (x, y) = tx(Point::new(b.x_min, b.y_max));
        regions = regions
            .add(
                Rectangle::new()
                    .set("x", x)
                    .set("y", y)
                    .set("width", b.x_max - b.x_min)
                    .set("height", b.y_max - b.y_min),
            )
            .add(
                TextElement::new(name.as_str())
                    .set("x", x)
                    .set("y", y - 0.05)
                    .set("font-size", 0.15)
                    .set("fill", "orange")
                    .set("stroke", "none"),
            );
    }
    doc = doc.add(regions);

    // Skeleton points.
    let mut skeleton = Group::new().set("id", "skeleton").set("fill", "#969696");
    for &p in &scene.skeleton {
        skeleton = skeleton.add(dot(tx(p), 0.01));
    }
    doc = doc.add(skeleton);

    // Contours.
    let mut contours = Group::new()
        .set("id", "contours")
        .set("stroke", "#285ac8")
        .set("stroke-width", 0.015)
        .set("fill", "none");
    for contour in &scene.contours {
        let d = build_path_data(contour, x_left, y_top, true);
        if !d.is_empty() {
            contours = contours.add(Path::new().set("d", d));
        }
    }
    doc = doc.add(contours);

    // Rapids (thin, dashed) then cuts (solid).
    let mut rapids = Group::new()
        .set("id", "rapids")
        .set("stroke", "green")
        .set("stroke-width", 0.01)
        .set("stroke-dasharray", "0.05 0.05");
    for &(a, b) in &scene.rapids {
        rapids = rapids.add(line(tx(a), tx(b)));
    }
    doc = doc.add(rapids);

    let mut cuts = Group::new()
        .set("id", "cuts")
        .set("stroke", "#c81e1e")
        .set("stroke-width", 0.03)
        .set("fill", "none");
    for cut in &scene.cuts {
        let d = build_path_data(cut, x_left, y_top, false);
        if !d.is_empty() {
            cuts = cuts.add(Path::new().set("d", d));
        }
    }
    doc = doc.add(cuts);

    // Ideal slots (hollow) and snapped teeth (filled).
    let mut ideals = Group::new()
        .set("id", "ideals")
        .set("stroke", "purple")
        .set("stroke-width", 0.015)
        .set("fill", "none");
    for &p in &scene.ideals {
        ideals = ideals.add(dot(tx(p), 0.06));
    }
    doc = doc.add(ideals);

    let mut teeth = Group::new().set("id", "teeth").set("fill", "black");
    for &p in &scene.teeth {
        teeth = teeth.add(dot(tx(p), 0.035));
    }
    doc = doc.add(teeth);

    // Verdict frame.
    doc = doc.add(
        Rectangle::new()
            .set("id", "verdict")
            .set("width", w)
            .set("height", h)
            .set("fill", "none")
            .set("stroke", if scene.passed { "green" } else { "red" })
            .set("stroke-width", 0.1)
            .set("data-passed", if scene.passed { "true" } else { "false" }),
    );

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

fn line(a: (f64, f64), b: (f64, f64)) -> Line {
    Line::new()
        .set("x1", a.0)
        .set("y1", a.1)
        .set("x2", b.0)
        .set("y2", b.1)
}

fn dot(c: (f64, f64), r: f64) -> Circle {
    Circle::new().set("cx", c.0).set("cy", c.1).set("r", r)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brok_pipeline::BoundingBox;

    use super::*;

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    fn scene() -> QcScene {
        QcScene {
            view: BoundingBox::new(0.0, 2.0, 0.0, 1.0),
            regions: vec![("upper_jaw".to_owned(), BoundingBox::new(0.5, 1.5, 0.25, 0.75))],
            skeleton: vec![Point::new(1.0, 0.5), Point::new(1.25, 0.5)],
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
            passed: true,
        }
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_too_short() {
        assert_eq!(build_path_data(&[], 0.0, 0.0, false), "");
        assert_eq!(build_path_data(&[Point::new(1.0, 1.0)], 0.0, 0.0, false), "");
    }

    #[test]
    fn build_path_data_flips_y() {
        let d = build_path_data(
            &[Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
            0.0,
            5.0,
            false,
        );
        assert_eq!(d, "M1,3 L3,1");
    }

    #[test]
    fn build_path_data_closes() {
        let d = build_path_data(
            &[Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)],
            0.0,
            1.0,
            true,
        );
        assert!(d.ends_with('z'));
    }

    // --- document ---

    #[test]
    fn document_is_sized_in_inches() {
        let svg = to_qc_svg(&scene(), &no_meta());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"width="2in""#));
        assert!(svg.contains(r#"height="1in""#));
        assert!(svg.contains(r#"viewBox="0 0 2 1""#));
    }

    #[test]
    fn every_layer_present() {
        let svg = to_qc_svg(&scene(), &no_meta());
        for id in [
            "grid", "regions", "skeleton", "contours", "rapids", "cuts", "ideals", "teeth", "verdict",
        ] {
            assert!(svg.contains(&format!(r#"id="{id}""#)), "missing layer {id}");
        }
        assert!(svg.contains(">upper_jaw<"));
    }

    #[test]
    fn verdict_colour() {
        let svg = to_qc_svg(&scene(), &no_meta());
        assert!(svg.contains(r#"data-passed="true""#));
        let failing = QcScene {
            passed: false,
            ..scene()
        };
        let svg = to_qc_svg(&failing, &no_meta());
        assert!(svg.contains(r#"data-passed="false""#));
        assert!(svg.contains(r#"stroke="red""#));
    }

    #[test]
    fn metadata_escaped() {
        let meta = SvgMetadata {
            title: Some("a<b"),
            description: Some("x & y"),
        };
        let svg = to_qc_svg(&scene(), &meta);
        assert!(svg.contains("<title>a&lt;b</title>"));
        assert!(svg.contains("<desc>x &amp; y</desc>"));
    }
}
