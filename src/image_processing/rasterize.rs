use image::{Rgba, RgbaImage};

use super::document::VectorDocument;
use crate::error::{DepixelError, DepixelResult};

/// Avoid pathological allocations for absurd preview sizes.
const MAX_DIM: u32 = 16_384;

/// Renders a vector document to a raster of an exact size.
pub trait Rasterizer: Send + Sync {
    /// Uncovered pixels must come out fully transparent.
    fn render(&self, document: &VectorDocument, width: u32, height: u32) -> DepixelResult<RgbaImage>;

    fn name(&self) -> &'static str;
}

/// `usvg` + `resvg` renderer.
///
/// The document is stretched to fill the target on each axis independently,
/// matching a plain resize of the drawing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgRasterizer;

impl Rasterizer for SvgRasterizer {
    fn render(&self, document: &VectorDocument, width: u32, height: u32) -> DepixelResult<RgbaImage> {
        if width == 0 || height == 0 || width > MAX_DIM || height > MAX_DIM {
            return Err(DepixelError::render(format!(
                "invalid preview size {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
            )));
        }

        let opts = usvg::Options::default();
        let tree = usvg::Tree::from_data(document.as_str().as_bytes(), &opts)
            .map_err(|e| DepixelError::render(format!("parse svg tree: {e}")))?;

        let size = tree.size();
        if !(size.width() > 0.0 && size.height() > 0.0) {
            return Err(DepixelError::render("svg has invalid width/height"));
        }

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| DepixelError::render("failed to allocate svg pixmap"))?;

        let sx = (width as f32) / size.width();
        let sy = (height as f32) / size.height();
        let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);
        resvg::render(&tree, xform, &mut pixmap.as_mut());

        Ok(demultiply(&pixmap))
    }

    fn name(&self) -> &'static str {
        "resvg"
    }
}

/// tiny-skia stores premultiplied RGBA; PNG wants straight alpha.
fn demultiply(pixmap: &resvg::tiny_skia::Pixmap) -> RgbaImage {
    let mut out = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    out
}
