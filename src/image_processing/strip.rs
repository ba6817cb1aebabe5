//! Removal of chroma-key shapes from a traced SVG.
//!
//! Every region that was transparent in the source comes back from the tracer
//! as one or more shapes filled with the key color. Cutting those shapes out
//! is what restores transparency in the final artwork.
//!
//! Removal edits the original markup by byte range: nothing else in the
//! document is re-serialized, so untouched shapes keep their exact text and
//! order.

use std::ops::Range;

use super::chroma_key::KeyMatcher;
use super::document::{is_shape, VectorDocument};
use crate::error::DepixelResult;

/// Result of stripping a document.
#[derive(Debug, Clone)]
pub struct StripOutcome {
    pub document: VectorDocument,
    pub removed: usize,
    pub kept: usize,
}

/// Effective fill of a shape element.
///
/// A `fill` declaration inside `style` wins over the `fill` presentation
/// attribute, as in CSS.
pub fn effective_fill<'a>(node: &roxmltree::Node<'a, '_>) -> Option<&'a str> {
    node.attribute("style")
        .and_then(style_fill)
        .or_else(|| node.attribute("fill"))
}

/// Extract the value of the last `fill` declaration in an inline style.
fn style_fill(style: &str) -> Option<&str> {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .filter(|(prop, _)| prop.trim().eq_ignore_ascii_case("fill"))
        .map(|(_, value)| {
            let value = value.trim();
            value
                .strip_suffix("!important")
                .map(str::trim_end)
                .unwrap_or(value)
        })
        .last()
}

/// Remove every shape whose fill resolves to the chroma key.
pub fn strip_chroma_key(document: &VectorDocument, matcher: &KeyMatcher) -> DepixelResult<StripOutcome> {
    let text = document.as_str();
    let parsed = document.parse()?;

    let mut cuts: Vec<Range<usize>> = Vec::new();
    let mut kept = 0;

    for node in parsed.descendants().filter(|n| is_shape(n)) {
        let range = node.range();
        // Shapes nested inside an already removed shape go with it
        if cuts.last().is_some_and(|last| last.end >= range.end) {
            continue;
        }

        match effective_fill(&node) {
            Some(fill) if matcher.is_key(fill) => cuts.push(range),
            _ => kept += 1,
        }
    }

    let removed = cuts.len();
    let markup = cut_ranges(text, &cuts);

    Ok(StripOutcome {
        document: VectorDocument::from_markup(markup),
        removed,
        kept,
    })
}

/// Cut the given element ranges out of `text`.
///
/// When an element sits alone on its line, the whole line is removed so the
/// output does not fill up with blank lines.
fn cut_ranges(text: &str, cuts: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for range in cuts {
        let range = widen_to_line(text, range.clone());
        out.push_str(&text[cursor..range.start]);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn widen_to_line(text: &str, range: Range<usize>) -> Range<usize> {
    let bytes = text.as_bytes();
    let is_blank = |b: u8| b == b' ' || b == b'\t';

    let mut start = range.start;
    while start > 0 && is_blank(bytes[start - 1]) {
        start -= 1;
    }
    let at_line_start = start == 0 || bytes[start - 1] == b'\n';

    let mut end = range.end;
    while end < bytes.len() && is_blank(bytes[end]) {
        end += 1;
    }
    let line_end = if text[end..].starts_with("\r\n") {
        Some(end + 2)
    } else if text[end..].starts_with('\n') {
        Some(end + 1)
    } else {
        None
    };

    match line_end {
        Some(line_end) if at_line_start => start..line_end,
        _ => range,
    }
}
