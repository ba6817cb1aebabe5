//! Edge-aware pixel-art upscaling (EPX / Scale2x / Scale3x).
//!
//! These scalers only ever copy existing pixels, never blend them, so the
//! palette of the output is exactly the palette of the input. The chroma key
//! therefore survives upscaling bit-for-bit, which is what makes it
//! recognizable again after tracing.
//!
//! For the 3x3 neighbourhood
//! ```text
//!   A B C
//!   D E F
//!   G H I
//! ```
//! Scale2x produces
//! ```text
//!   E0 = D == B && B != F && D != H ? D : E
//!   E1 = B == F && B != D && F != H ? F : E
//!   E2 = D == H && D != B && H != F ? D : E
//!   E3 = H == F && D != H && B != F ? F : E
//! ```
//! and Scale3x extends the same idea to a 3x3 output block.

use image::{imageops, Rgba, RgbaImage};

/// Scales a raster by an integer factor.
pub trait Upscaler: Send + Sync {
    /// Return an image of `(width * factor, height * factor)`. A factor of 0 is treated as 1.
    fn upscale(&self, img: &RgbaImage, factor: u32) -> RgbaImage;

    fn name(&self) -> &'static str;
}

/// Default upscaler: factors the scale into 2s and 3s and applies Scale2x/Scale3x passes.
///
/// Remaining prime factors (5, 7, ...) are applied with nearest-neighbour
/// replication as a final pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeAwareUpscaler;

impl Upscaler for EdgeAwareUpscaler {
    fn upscale(&self, img: &RgbaImage, factor: u32) -> RgbaImage {
        if img.width() == 0 || img.height() == 0 {
            return img.clone();
        }
        let (passes, rest) = plan_passes(factor.max(1));

        let mut current = img.clone();
        for pass in passes {
            current = match pass {
                2 => scale2x(&current),
                _ => scale3x(&current),
            };
        }

        if rest > 1 {
            let (w, h) = current.dimensions();
            current = imageops::resize(&current, w * rest, h * rest, imageops::FilterType::Nearest);
        }
        current
    }

    fn name(&self) -> &'static str {
        "epx"
    }
}

/// Split `factor` into Scale3x/Scale2x passes and a leftover factor.
fn plan_passes(mut factor: u32) -> (Vec<u32>, u32) {
    let mut passes = Vec::new();
    while factor % 3 == 0 {
        passes.push(3);
        factor /= 3;
    }
    while factor % 2 == 0 {
        passes.push(2);
        factor /= 2;
    }
    (passes, factor)
}

/// Neighbour lookup with edge clamping.
#[inline]
fn px(img: &RgbaImage, x: i64, y: i64) -> Rgba<u8> {
    let (w, h) = img.dimensions();
    let cx = x.clamp(0, w as i64 - 1) as u32;
    let cy = y.clamp(0, h as i64 - 1) as u32;
    *img.get_pixel(cx, cy)
}

pub fn scale2x(input: &RgbaImage) -> RgbaImage {
    let (width, height) = input.dimensions();
    let mut output = RgbaImage::new(width * 2, height * 2);

    for y in 0..height {
        for x in 0..width {
            let (xi, yi) = (x as i64, y as i64);
            let e = px(input, xi, yi);
            let b = px(input, xi, yi - 1);
            let d = px(input, xi - 1, yi);
            let f = px(input, xi + 1, yi);
            let h = px(input, xi, yi + 1);

            let (e0, e1, e2, e3) = if b != h && d != f {
                (
                    if d == b { d } else { e },
                    if b == f { f } else { e },
                    if d == h { d } else { e },
                    if h == f { f } else { e },
                )
            } else {
                (e, e, e, e)
            };

            let (ox, oy) = (x * 2, y * 2);
            output.put_pixel(ox, oy, e0);
            output.put_pixel(ox + 1, oy, e1);
            output.put_pixel(ox, oy + 1, e2);
            output.put_pixel(ox + 1, oy + 1, e3);
        }
    }

    output
}

pub fn scale3x(input: &RgbaImage) -> RgbaImage {
    let (width, height) = input.dimensions();
    let mut output = RgbaImage::new(width * 3, height * 3);

    for y in 0..height {
        for x in 0..width {
            let (xi, yi) = (x as i64, y as i64);
            let a = px(input, xi - 1, yi - 1);
            let b = px(input, xi, yi - 1);
            let c = px(input, xi + 1, yi - 1);
            let d = px(input, xi - 1, yi);
            let e = px(input, xi, yi);
            let f = px(input, xi + 1, yi);
            let g = px(input, xi - 1, yi + 1);
            let h = px(input, xi, yi + 1);
            let i = px(input, xi + 1, yi + 1);

            let block = if b != h && d != f {
                [
                    if d == b { d } else { e },
                    if (d == b && e != c) || (b == f && e != a) { b } else { e },
                    if b == f { f } else { e },
                    if (d == b && e != g) || (d == h && e != a) { d } else { e },
                    e,
                    if (b == f && e != i) || (h == f && e != c) { f } else { e },
                    if d == h { d } else { e },
                    if (d == h && e != i) || (h == f && e != g) { h } else { e },
                    if h == f { f } else { e },
                ]
            } else {
                [e; 9]
            };

            let (ox, oy) = (x * 3, y * 3);
            for (n, pixel) in block.into_iter().enumerate() {
                output.put_pixel(ox + (n as u32 % 3), oy + (n as u32 / 3), pixel);
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const KEY: Rgba<u8> = Rgba([0, 255, 0, 255]);

    /// Diagonal split: red above the anti-diagonal, key below.
    fn diagonal(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| if x + y < size { RED } else { KEY })
    }

    #[test]
    fn test_plan_passes() {
        assert_eq!(plan_passes(1), (vec![], 1));
        assert_eq!(plan_passes(4), (vec![2, 2], 1));
        assert_eq!(plan_passes(6), (vec![3, 2], 1));
        assert_eq!(plan_passes(5), (vec![], 5));
        assert_eq!(plan_passes(10), (vec![2], 5));
    }

    #[test]
    fn test_dimensions_for_each_factor() {
        let img = diagonal(5);
        for factor in 1..=8 {
            let out = EdgeAwareUpscaler.upscale(&img, factor);
            assert_eq!(out.dimensions(), (5 * factor, 5 * factor), "factor {factor}");
        }
        assert_eq!(EdgeAwareUpscaler.upscale(&img, 0).dimensions(), (5, 5));
    }

    #[test]
    fn test_palette_is_preserved() {
        let img = diagonal(6);
        let out = EdgeAwareUpscaler.upscale(&img, 4);
        let colors: HashSet<[u8; 4]> = out.pixels().map(|p| p.0).collect();
        assert_eq!(colors, HashSet::from([RED.0, KEY.0]));
    }

    #[test]
    fn test_flat_image_stays_flat() {
        let img = RgbaImage::from_pixel(3, 2, RED);
        assert!(scale2x(&img).pixels().all(|p| *p == RED));
        assert!(scale3x(&img).pixels().all(|p| *p == RED));
    }

    #[test]
    fn test_scale2x_smooths_diagonal() {
        // A single-pixel staircase: nearest-neighbour would keep 2x2 steps,
        // Scale2x fills the inner corner of each step.
        let img = diagonal(4);
        let out = scale2x(&img);

        // Pixel (2,2) is key; its top (2,1) and left (1,2) are red,
        // so the top-left sub-pixel of its block turns red.
        assert_eq!(*out.get_pixel(4, 4), RED);
        assert_eq!(*out.get_pixel(5, 4), KEY);
        assert_eq!(*out.get_pixel(5, 5), KEY);
    }

    #[test]
    fn test_interior_of_regions_unchanged() {
        let mut img = RgbaImage::from_pixel(8, 8, RED);
        for y in 2..6 {
            for x in 2..6 {
                img.put_pixel(x, y, KEY);
            }
        }
        let out = EdgeAwareUpscaler.upscale(&img, 4);
        for y in 12..20 {
            for x in 12..20 {
                assert_eq!(*out.get_pixel(x, y), KEY);
            }
        }
        assert_eq!(*out.get_pixel(0, 0), RED);
        assert_eq!(*out.get_pixel(31, 31), RED);
    }
}
