use image::{Rgb, RgbImage};
use std::collections::HashMap;
use std::fmt::Write as _;
use visioncortex::{ColorImage, PathSimplifyMode};
use vtracer::{ColorMode, Config, Hierarchical};

use super::document::VectorDocument;
use crate::error::{DepixelError, DepixelResult};

/// Turns an opaque RGB raster into a vector document of filled regions.
pub trait Vectorizer: Send + Sync {
    fn vectorize(&self, img: &RgbImage) -> DepixelResult<VectorDocument>;

    fn name(&self) -> &'static str;
}

/// Color tracer backed by `vtracer`.
///
/// Uses cutout layering so shapes never sit on top of key-colored regions;
/// with stacked layering a shape below a transparent hole would fill that
/// hole once the key shapes are stripped.
#[derive(Debug, Clone)]
pub struct TracingVectorizer {
    settings: TraceSettings,
}

#[derive(Debug, Clone, Copy)]
struct TraceSettings {
    filter_speckle: usize,
    color_precision: i32,
    layer_difference: i32,
    corner_threshold: i32,
    length_threshold: f64,
    max_iterations: usize,
    splice_threshold: i32,
    path_precision: u32,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            filter_speckle: 4,
            color_precision: 6,
            layer_difference: 16,
            corner_threshold: 60,
            length_threshold: 4.0,
            max_iterations: 10,
            splice_threshold: 45,
            path_precision: 3,
        }
    }
}

impl TracingVectorizer {
    pub fn new() -> Self {
        Self {
            settings: TraceSettings::default(),
        }
    }

    fn config(&self) -> Config {
        let s = self.settings;
        Config {
            color_mode: ColorMode::Color,
            hierarchical: Hierarchical::Cutout,
            mode: PathSimplifyMode::Spline,
            filter_speckle: s.filter_speckle,
            color_precision: s.color_precision,
            layer_difference: s.layer_difference,
            corner_threshold: s.corner_threshold,
            length_threshold: s.length_threshold,
            max_iterations: s.max_iterations,
            splice_threshold: s.splice_threshold,
            path_precision: Some(s.path_precision),
        }
    }
}

impl Default for TracingVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Vectorizer for TracingVectorizer {
    fn vectorize(&self, img: &RgbImage) -> DepixelResult<VectorDocument> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(DepixelError::vectorization("cannot trace an empty image"));
        }

        // The tracer reads RGBA; every pixel is opaque at this point
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for p in img.pixels() {
            pixels.extend_from_slice(&[p[0], p[1], p[2], 255]);
        }
        let color_image = ColorImage {
            pixels,
            width: width as usize,
            height: height as usize,
        };

        let svg = vtracer::convert(color_image, self.config()).map_err(DepixelError::Vectorization)?;
        Ok(VectorDocument::from_markup(svg.to_string()))
    }

    fn name(&self) -> &'static str {
        "trace"
    }
}

/// Lossless vectorizer emitting one `<rect>` per run of equal pixels.
///
/// Horizontal runs are merged downwards while the run below has the same
/// span and color, so flat areas collapse into a handful of rectangles.
/// Output is fully deterministic, which makes it the vectorizer of choice
/// for reproducible batches and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelGridVectorizer;

#[derive(Debug, Clone, Copy)]
struct Run {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    color: Rgb<u8>,
}

impl PixelGridVectorizer {
    fn runs(img: &RgbImage) -> Vec<Run> {
        let (width, height) = img.dimensions();
        let mut finished = Vec::new();
        // Open runs keyed by (x, width)
        let mut open: HashMap<(u32, u32), Run> = HashMap::new();

        for y in 0..height {
            let mut next_open = HashMap::new();
            let mut x = 0;
            while x < width {
                let color = *img.get_pixel(x, y);
                let start = x;
                while x < width && *img.get_pixel(x, y) == color {
                    x += 1;
                }
                let span = (start, x - start);

                let run = match open.remove(&span) {
                    Some(mut run) if run.color == color => {
                        run.height += 1;
                        run
                    }
                    other => {
                        if let Some(run) = other {
                            finished.push(run);
                        }
                        Run {
                            x: start,
                            y,
                            width: span.1,
                            height: 1,
                            color,
                        }
                    }
                };
                next_open.insert(span, run);
            }
            finished.extend(open.into_values());
            open = next_open;
        }
        finished.extend(open.into_values());

        finished.sort_by_key(|r| (r.y, r.x));
        finished
    }
}

impl Vectorizer for PixelGridVectorizer {
    fn vectorize(&self, img: &RgbImage) -> DepixelResult<VectorDocument> {
        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(DepixelError::vectorization("cannot vectorize an empty image"));
        }

        let mut svg = String::new();
        svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" shape-rendering=\"crispEdges\">",
            w = width,
            h = height
        );
        for run in Self::runs(img) {
            let [r, g, b] = run.color.0;
            let _ = writeln!(
                svg,
                "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"#{:02x}{:02x}{:02x}\"/>",
                run.x, run.y, run.width, run.height, r, g, b
            );
        }
        svg.push_str("</svg>\n");

        Ok(VectorDocument::from_markup(svg))
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}
