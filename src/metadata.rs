use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// MetadataValue – a single scalar in the metadata envelope
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to interpret the value as an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to interpret the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Integer(i)
    }
}

impl From<usize> for MetadataValue {
    fn from(i: usize) -> Self {
        MetadataValue::Integer(i as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// Metadata – hierarchical envelope with dotted key paths
// ---------------------------------------------------------------------------

/// One node of the metadata tree: either a scalar or a nested group.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataNode {
    Value(MetadataValue),
    Group(BTreeMap<String, MetadataNode>),
}

/// Hierarchical key-value record attached to a loaded cube.
///
/// Keys are dotted paths in the convention of the vendor export, e.g.
/// `Acquisition_instrument.SEM.resolution_x`. The envelope is populated once
/// during load; downstream consumers read but do not mutate it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    root: BTreeMap<String, MetadataNode>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value at a dotted path, creating intermediate groups as needed.
    ///
    /// An existing scalar along the path is replaced by a group; the last
    /// writer wins, matching the vendor tree-setter semantics.
    pub fn set_item(&mut self, path: &str, value: impl Into<MetadataValue>) {
        let mut parts = path.split('.').peekable();
        let mut current = &mut self.root;

        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                current.insert(part.to_string(), MetadataNode::Value(value.into()));
                return;
            }
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| MetadataNode::Group(BTreeMap::new()));
            if !matches!(entry, MetadataNode::Group(_)) {
                *entry = MetadataNode::Group(BTreeMap::new());
            }
            match entry {
                MetadataNode::Group(map) => current = map,
                MetadataNode::Value(_) => unreachable!("scalar was just replaced by a group"),
            }
        }
    }

    /// Get the scalar at a dotted path, if present.
    pub fn get_item(&self, path: &str) -> Option<&MetadataValue> {
        let mut parts = path.split('.').peekable();
        let mut current = &self.root;

        while let Some(part) = parts.next() {
            match current.get(part)? {
                MetadataNode::Value(v) => {
                    return if parts.peek().is_none() { Some(v) } else { None };
                }
                MetadataNode::Group(map) => current = map,
            }
        }
        None
    }

    /// Whether any item has been set.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Serialize the whole tree as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Iterate `(dotted_path, value)` pairs in key order.
    pub fn iter_flat(&self) -> Vec<(String, &MetadataValue)> {
        fn walk<'a>(
            prefix: &str,
            map: &'a BTreeMap<String, MetadataNode>,
            out: &mut Vec<(String, &'a MetadataValue)>,
        ) {
            for (key, node) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match node {
                    MetadataNode::Value(v) => out.push((path, v)),
                    MetadataNode::Group(inner) => walk(&path, inner, out),
                }
            }
        }
        let mut out = Vec::new();
        walk("", &self.root, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_nested() {
        let mut md = Metadata::new();
        md.set_item("Acquisition_instrument.SEM.resolution_x", 128usize);
        md.set_item("Acquisition_instrument.SEM.FOV", 488.28125);
        md.set_item("General.title", "TEST");

        assert_eq!(
            md.get_item("Acquisition_instrument.SEM.resolution_x")
                .and_then(MetadataValue::as_i64),
            Some(128)
        );
        assert_eq!(
            md.get_item("Acquisition_instrument.SEM.FOV")
                .and_then(MetadataValue::as_f64),
            Some(488.28125)
        );
        assert_eq!(
            md.get_item("General.title").and_then(MetadataValue::as_str),
            Some("TEST")
        );
        assert!(md.get_item("Acquisition_instrument.CCD.binning").is_none());
    }

    #[test]
    fn partial_path_is_not_a_value() {
        let mut md = Metadata::new();
        md.set_item("a.b.c", 1i64);
        assert!(md.get_item("a.b").is_none());
        assert!(md.get_item("a.b.c.d").is_none());
    }

    #[test]
    fn flat_iteration_is_ordered() {
        let mut md = Metadata::new();
        md.set_item("b.y", 2i64);
        md.set_item("a.x", 1i64);
        let flat: Vec<String> = md.iter_flat().into_iter().map(|(k, _)| k).collect();
        assert_eq!(flat, vec!["a.x".to_string(), "b.y".to_string()]);
    }

    #[test]
    fn json_export() {
        let mut md = Metadata::new();
        md.set_item("General.title", "X");
        let json = md.to_json().unwrap();
        assert!(json.contains("\"General\""));
        assert!(json.contains("\"title\": \"X\""));
    }
}
