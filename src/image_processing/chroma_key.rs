//! Chroma-key substitution for transparent pixels and matching of key-colored fills.
//!
//! Tracers have no alpha channel, so every fully transparent pixel is painted
//! with a reserved sentinel color before tracing. The same color is recognized
//! again in the traced SVG so the shapes it produced can be dropped.
//!
//! Fill values come in several notations. Each notation is a [`ColorNotation`]
//! and a [`KeyMatcher`] tries them in order, so new spellings can be added
//! without touching the stripper.

use image::{Rgb, Rgba, RgbaImage};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

/// The sentinel color used in place of transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChromaKey(pub Rgb<u8>);

impl ChromaKey {
    /// Pure green, the classic green-screen color.
    pub const GREEN: ChromaKey = ChromaKey(Rgb([0, 255, 0]));

    pub fn rgb(&self) -> Rgb<u8> {
        self.0
    }

    /// Lowercase `#rrggbb` spelling.
    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.0 .0;
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl Default for ChromaKey {
    fn default() -> Self {
        Self::GREEN
    }
}

impl fmt::Display for ChromaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ChromaKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HexNotation
            .resolve(s.trim())
            .map(ChromaKey)
            .ok_or_else(|| format!("Invalid chroma key '{}'. Expected hex format like #00FF00", s))
    }
}

/// Replace every fully transparent pixel with the opaque chroma key.
///
/// Pixels with any non-zero alpha, including partial alpha, are copied as-is.
/// The input is left untouched.
pub fn encode_transparency(img: &RgbaImage, key: ChromaKey) -> RgbaImage {
    let [r, g, b] = key.0 .0;
    let keyed = Rgba([r, g, b, 255]);

    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        if pixel[3] == 0 {
            *pixel = keyed;
        }
    }
    out
}

/// One way of spelling a color in an SVG fill.
pub trait ColorNotation: Send + Sync + fmt::Debug {
    /// Resolve `value` to an RGB triple, or `None` when this notation does not apply.
    ///
    /// `value` is already trimmed and lowercased by the caller.
    fn resolve(&self, value: &str) -> Option<Rgb<u8>>;
}

/// `#rgb`, `#rgba`, `#rrggbb` and `#rrggbbaa`. Alpha is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexNotation;

impl ColorNotation for HexNotation {
    fn resolve(&self, value: &str) -> Option<Rgb<u8>> {
        let hex = value.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
        let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        match hex.len() {
            3 | 4 => Some(Rgb([digit(0)?, digit(1)?, digit(2)?])),
            6 | 8 => Some(Rgb([pair(0)?, pair(2)?, pair(4)?])),
            _ => None,
        }
    }
}

/// `rgb(r, g, b)` and `rgba(r, g, b, a)`, with integer or percentage channels,
/// separated by commas or whitespace. Alpha is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionalNotation;

fn functional_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^rgba?\(\s*([0-9.]+%?)\s*[,\s]\s*([0-9.]+%?)\s*[,\s]\s*([0-9.]+%?)\s*(?:[,/]\s*[0-9.]+%?\s*)?\)$",
        )
        .expect("functional color regex is valid")
    })
}

fn parse_channel(raw: &str) -> Option<u8> {
    if let Some(pct) = raw.strip_suffix('%') {
        let pct: f32 = pct.parse().ok()?;
        if !(0.0..=100.0).contains(&pct) {
            return None;
        }
        Some((pct * 2.55).round() as u8)
    } else {
        let value: f32 = raw.parse().ok()?;
        if !(0.0..=255.0).contains(&value) {
            return None;
        }
        Some(value.round() as u8)
    }
}

impl ColorNotation for FunctionalNotation {
    fn resolve(&self, value: &str) -> Option<Rgb<u8>> {
        let caps = functional_regex().captures(value)?;
        Some(Rgb([
            parse_channel(&caps[1])?,
            parse_channel(&caps[2])?,
            parse_channel(&caps[3])?,
        ]))
    }
}

/// Named colors bound explicitly to an RGB value.
///
/// The binding is deliberate rather than the CSS table: CSS `green` is
/// `#008000`, but tracers and hand-written documents use it for the key.
#[derive(Debug, Clone, Default)]
pub struct NamedNotation {
    names: Vec<(String, Rgb<u8>)>,
}

impl NamedNotation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &str, rgb: Rgb<u8>) -> Self {
        self.names.push((name.trim().to_lowercase(), rgb));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|(n, _)| n.as_str())
    }
}

impl ColorNotation for NamedNotation {
    fn resolve(&self, value: &str) -> Option<Rgb<u8>> {
        self.names
            .iter()
            .find(|(name, _)| name == value)
            .map(|(_, rgb)| *rgb)
    }
}

/// Decides whether a fill value denotes the chroma key.
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    key: ChromaKey,
    notations: Vec<Arc<dyn ColorNotation>>,
}

impl KeyMatcher {
    /// Matcher recognizing hex, functional and the given named aliases.
    pub fn new(key: ChromaKey, aliases: &[&str]) -> Self {
        let named = aliases
            .iter()
            .fold(NamedNotation::new(), |named, alias| named.bind(alias, key.0));

        Self {
            key,
            notations: vec![
                Arc::new(HexNotation),
                Arc::new(FunctionalNotation),
                Arc::new(named),
            ],
        }
    }

    /// Add another notation, tried after the existing ones.
    pub fn with_notation(mut self, notation: impl ColorNotation + 'static) -> Self {
        self.notations.push(Arc::new(notation));
        self
    }

    pub fn key(&self) -> ChromaKey {
        self.key
    }

    /// Resolve a fill value through the registered notations.
    pub fn resolve(&self, fill: &str) -> Option<Rgb<u8>> {
        let value = fill.trim().to_lowercase();
        self.notations.iter().find_map(|n| n.resolve(&value))
    }

    pub fn is_key(&self, fill: &str) -> bool {
        self.resolve(fill) == Some(self.key.0)
    }
}

impl Default for KeyMatcher {
    fn default() -> Self {
        Self::new(ChromaKey::GREEN, &["green", "lime"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_transparency_rewrites_only_fully_transparent() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([12, 34, 56, 0]));
        img.put_pixel(1, 0, Rgba([200, 10, 10, 255]));
        img.put_pixel(2, 0, Rgba([1, 2, 3, 128]));

        let encoded = encode_transparency(&img, ChromaKey::GREEN);

        assert_eq!(encoded.dimensions(), (3, 1));
        assert_eq!(*encoded.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
        assert_eq!(*encoded.get_pixel(1, 0), Rgba([200, 10, 10, 255]));
        // Partial alpha is intentionally left alone
        assert_eq!(*encoded.get_pixel(2, 0), Rgba([1, 2, 3, 128]));
    }

    #[test]
    fn test_encode_transparency_leaves_input_untouched() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 0]));
        let encoded = encode_transparency(&img, ChromaKey(Rgb([255, 0, 255])));

        assert!(img.pixels().all(|p| *p == Rgba([9, 9, 9, 0])));
        assert!(encoded.pixels().all(|p| *p == Rgba([255, 0, 255, 255])));
    }

    #[test]
    fn test_encode_transparency_every_pixel() {
        // Walk a grid of alpha/color combinations
        let mut img = RgbaImage::new(16, 16);
        for (x, y, p) in img.enumerate_pixels_mut() {
            let alpha = if (x + y) % 3 == 0 { 0 } else { (x * 16 + y) as u8 };
            *p = Rgba([x as u8 * 10, y as u8 * 10, 77, alpha]);
        }

        let encoded = encode_transparency(&img, ChromaKey::GREEN);
        for (x, y, src) in img.enumerate_pixels() {
            let out = encoded.get_pixel(x, y);
            if src[3] == 0 {
                assert_eq!(*out, Rgba([0, 255, 0, 255]));
            } else {
                assert_eq!(out, src);
            }
        }
    }

    #[test]
    fn test_hex_notation() {
        assert_eq!(HexNotation.resolve("#00ff00"), Some(Rgb([0, 255, 0])));
        assert_eq!(HexNotation.resolve("#0f0"), Some(Rgb([0, 255, 0])));
        assert_eq!(HexNotation.resolve("#0f0f"), Some(Rgb([0, 255, 0])));
        assert_eq!(HexNotation.resolve("#00ff0080"), Some(Rgb([0, 255, 0])));
        assert_eq!(HexNotation.resolve("00ff00"), None);
        assert_eq!(HexNotation.resolve("#00ff0"), None);
        assert_eq!(HexNotation.resolve("#00gg00"), None);
    }

    #[test]
    fn test_functional_notation() {
        assert_eq!(
            FunctionalNotation.resolve("rgb(0,255,0)"),
            Some(Rgb([0, 255, 0]))
        );
        assert_eq!(
            FunctionalNotation.resolve("rgb( 0 , 255 , 0 )"),
            Some(Rgb([0, 255, 0]))
        );
        assert_eq!(
            FunctionalNotation.resolve("rgb(0 255 0)"),
            Some(Rgb([0, 255, 0]))
        );
        assert_eq!(
            FunctionalNotation.resolve("rgb(0%,100%,0%)"),
            Some(Rgb([0, 255, 0]))
        );
        assert_eq!(
            FunctionalNotation.resolve("rgba(0,255,0,0.5)"),
            Some(Rgb([0, 255, 0]))
        );
        assert_eq!(FunctionalNotation.resolve("rgb(0,256,0)"), None);
        assert_eq!(FunctionalNotation.resolve("hsl(120,100%,50%)"), None);
    }

    #[test]
    fn test_matcher_case_insensitive() {
        let matcher = KeyMatcher::default();
        for fill in ["#00FF00", "#00ff00", "RGB(0,255,0)", "Green", " lime ", "#0F0"] {
            assert!(matcher.is_key(fill), "{fill} should match the key");
        }
        for fill in ["#00fe00", "rgb(0,128,0)", "red", "none", "url(#grad)", ""] {
            assert!(!matcher.is_key(fill), "{fill} should not match the key");
        }
    }

    #[test]
    fn test_matcher_follows_custom_key() {
        let magenta = ChromaKey(Rgb([255, 0, 255]));
        let matcher = KeyMatcher::new(magenta, &["magenta", "fuchsia"]);

        assert!(matcher.is_key("#FF00FF"));
        assert!(matcher.is_key("Fuchsia"));
        assert!(!matcher.is_key("#00ff00"));
        assert!(!matcher.is_key("green"));
    }

    #[test]
    fn test_matcher_extensible() {
        #[derive(Debug)]
        struct Keyword;
        impl ColorNotation for Keyword {
            fn resolve(&self, value: &str) -> Option<Rgb<u8>> {
                (value == "chroma").then_some(Rgb([0, 255, 0]))
            }
        }

        let matcher = KeyMatcher::default();
        assert!(!matcher.is_key("CHROMA"));
        let matcher = matcher.with_notation(Keyword);
        assert!(matcher.is_key("CHROMA"));
    }

    #[test]
    fn test_chroma_key_parse_and_display() {
        let key: ChromaKey = "#FF00FF".parse().unwrap();
        assert_eq!(key.rgb(), Rgb([255, 0, 255]));
        assert_eq!(key.to_string(), "#ff00ff");
        assert!("green".parse::<ChromaKey>().is_err());
    }
}
