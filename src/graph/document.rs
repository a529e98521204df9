//! Dependency-pair document model.
//!
//! A document is a flat list of `(node, dependency)` pairs. A pair with a
//! dependency means the dependency node targets `node`; a pair without one
//! just declares `node`. Parsing a concrete file format is left to the host.

use serde::{Deserialize, Serialize};

/// One line of a shader network document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencyPair {
    pub node: String,
    #[serde(default)]
    pub dependency: Option<String>,
}

impl DependencyPair {
    pub fn new(node: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            dependency: Some(dependency.into()),
        }
    }

    /// A pair that only declares a node.
    pub fn single(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            dependency: None,
        }
    }

    /// Parse one whitespace, comma, tab or semicolon separated line.
    ///
    /// Returns `None` for blank lines. Extra columns are ignored.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|s| !s.is_empty());
        let node = parts.next()?;
        Some(Self {
            node: node.to_string(),
            dependency: parts.next().map(str::to_string),
        })
    }
}

/// Parse every non-empty line of a text document.
pub fn parse_pairs(text: &str) -> Vec<DependencyPair> {
    text.lines().filter_map(DependencyPair::parse_line).collect()
}

/// Render pairs back to text, one pair per line.
pub fn format_pairs(pairs: &[DependencyPair]) -> String {
    let mut out = String::new();
    for pair in pairs {
        out.push_str(&pair.node);
        if let Some(dependency) = &pair.dependency {
            out.push(' ');
            out.push_str(dependency);
        }
        out.push('\n');
    }
    out
}
