//! Logger Categories
//!
//! A category is an ordered list of segments identifying one logger in the
//! hierarchy. The empty list is the root; a child's category is its
//! parent's category with one segment appended.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hierarchical identifier of a logger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(Vec<String>);

impl Category {
    /// The root category (no segments).
    pub fn root() -> Self {
        Category(Vec::new())
    }

    /// The category reserved for the engine's own diagnostics.
    pub fn meta() -> Self {
        Category(vec!["logtape".to_string(), "meta".to_string()])
    }

    /// Segments of this category, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this is the root category.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this category has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// This category extended by one segment.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Category(segments)
    }

    /// The category one segment shorter, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Category(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Whether `prefix` is an element-wise prefix of this category.
    pub fn starts_with(&self, prefix: &Category) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0
    }

    /// This category with `prefix` segments prepended.
    pub fn prefixed_with(&self, prefix: &[String]) -> Self {
        if prefix.is_empty() {
            return self.clone();
        }
        let mut segments = prefix.to_vec();
        segments.extend(self.0.iter().cloned());
        Category(segments)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(root)");
        }
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for Category {
    /// A single-segment category. Segments are opaque; a dot inside a
    /// string does not split it.
    fn from(segment: &str) -> Self {
        Category(vec![segment.to_string()])
    }
}

impl From<String> for Category {
    fn from(segment: String) -> Self {
        Category(vec![segment])
    }
}

impl From<Vec<String>> for Category {
    fn from(segments: Vec<String>) -> Self {
        Category(segments)
    }
}

impl From<Vec<&str>> for Category {
    fn from(segments: Vec<&str>) -> Self {
        Category(segments.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Category {
    fn from(segments: &[&str]) -> Self {
        Category(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Category {
    fn from(segments: [&str; N]) -> Self {
        Category(segments.iter().map(|s| s.to_string()).collect())
    }
}
