//! Dotted/bracketed field paths over a JSON response tree
//!
//! `choices[0].message.content` and `choices.0.message.content` address the same node:
//! segments are split on `.`, `[` and `]`, object nodes are indexed by name and array
//! nodes by a numeric segment.

use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPath {
    raw: String,
    segments: Vec<String>,
}

impl ContentPath {
    pub fn parse(path: &str) -> Self {
        let segments = path
            .split(['.', '[', ']'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            raw: path.to_string(),
            segments,
        }
    }

    /// Walk the tree; a missing field, out-of-range index or type mismatch yields `None`
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Resolve to text: strings verbatim, other scalars and containers as JSON, null as empty
    pub fn extract_text(&self, root: &Value) -> String {
        match self.resolve(root) {
            Some(value) => value_to_text(value),
            None => String::new(),
        }
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
