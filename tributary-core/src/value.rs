//! Values
//!
//! All state and formula outputs are [`serde_json::Value`]s: nested objects
//! and arrays of scalars, cheap to compare structurally.

pub use serde_json::Value;

/// Deep value equality used for change detection.
///
/// Propagation stops at the first node whose new value `equals` the cached
/// one, so this must compare structure, never identity.
pub trait Equatable {
    fn equals(&self, other: &Self) -> bool;
}

impl Equatable for Value {
    fn equals(&self, other: &Self) -> bool {
        self == other
    }
}

/// One step of a path into a structured value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object field.
    Key(String),
    /// Array position.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Look up `path` inside `value`.
///
/// A missing key, an out-of-range index, or a segment that does not match
/// the shape of the value yields `Value::Null`.
pub fn get_in(value: &Value, path: &[PathSegment]) -> Value {
    let mut current = value;
    for segment in path {
        let next = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key),
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}
