use std::fmt;
use std::path::Path;

use crate::error::{DepixelError, DepixelResult};

/// SVG element names treated as filled shapes.
pub const SHAPE_ELEMENTS: &[&str] = &["rect", "path", "polygon", "polyline", "circle", "ellipse"];

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// A traced drawing, held as SVG markup.
///
/// The markup is kept verbatim so edits can cut elements out without
/// re-serializing (and reformatting) everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorDocument {
    markup: String,
}

impl VectorDocument {
    pub fn from_markup(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.markup
    }

    pub fn into_markup(self) -> String {
        self.markup
    }

    /// Parse the markup, mapping any XML error to `MalformedDocument`.
    pub fn parse(&self) -> DepixelResult<roxmltree::Document<'_>> {
        let options = roxmltree::ParsingOptions {
            allow_dtd: true,
            ..roxmltree::ParsingOptions::default()
        };
        roxmltree::Document::parse_with_options(&self.markup, options)
            .map_err(|e| DepixelError::malformed(e.to_string()))
    }

    /// Number of shape elements in the document.
    pub fn shape_count(&self) -> DepixelResult<usize> {
        let doc = self.parse()?;
        Ok(doc.descendants().filter(|n| is_shape(n)).count())
    }

    pub fn save(&self, path: &Path) -> DepixelResult<()> {
        std::fs::write(path, self.markup.as_bytes())
            .map_err(|e| DepixelError::output_write(path, e))
    }
}

impl fmt::Display for VectorDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.markup)
    }
}

/// True for SVG shape elements (SVG namespace or no namespace at all).
pub fn is_shape(node: &roxmltree::Node<'_, '_>) -> bool {
    if !node.is_element() {
        return false;
    }
    let tag = node.tag_name();
    let in_svg = matches!(tag.namespace(), None | Some(SVG_NAMESPACE));
    in_svg && SHAPE_ELEMENTS.contains(&tag.name())
}
