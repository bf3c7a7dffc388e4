//! Document values and sub-document paths
//!
//! A collection is stored as one JSON document, wrapped in [`JsonValue`].
//! A [`JsonPath`] names a node inside that document as a list of
//! [`PathSegment`]s; the empty path names the document itself.
//!
//! Collections only address one level deep (`[i]` for an element, `key` for
//! a map entry), but the store resolves paths of any depth.
//!
//! Indices are `usize`. The store's path language reads a negative index as
//! counting from the end, and that form has no representation here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A document, or a fragment of one
///
/// ```
/// use strata_core::JsonValue;
///
/// assert!(JsonValue::array().is_composite());
/// assert!(!JsonValue::from("member").is_composite());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonValue(Value);

impl JsonValue {
    /// `null`
    pub fn null() -> Self {
        JsonValue(Value::Null)
    }

    /// Empty array, the initial body of list, set and queue documents
    pub fn array() -> Self {
        JsonValue(Value::Array(Vec::new()))
    }

    /// Empty object, the initial body of map documents
    pub fn object() -> Self {
        JsonValue(Value::Object(serde_json::Map::new()))
    }

    /// Wrap a raw value
    pub fn from_value(value: Value) -> Self {
        JsonValue(value)
    }

    /// Unwrap into the raw value
    pub fn into_inner(self) -> Value {
        self.0
    }

    /// Borrow the raw value
    pub fn as_inner(&self) -> &Value {
        &self.0
    }

    /// Mutably borrow the raw value
    pub fn as_inner_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// Arrays and objects
    ///
    /// Set membership is restricted to non-composite values so that
    /// equality stays a plain value comparison.
    pub fn is_composite(&self) -> bool {
        self.0.is_array() || self.0.is_object()
    }

    /// JSON type name, for error messages
    pub fn type_name(&self) -> &'static str {
        value_type_name(&self.0)
    }
}

impl Deref for JsonValue {
    type Target = Value;

    fn deref(&self) -> &Value {
        &self.0
    }
}

impl DerefMut for JsonValue {
    fn deref_mut(&mut self) -> &mut Value {
        &mut self.0
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        JsonValue(value)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        value.0
    }
}

macro_rules! scalar_conversions {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for JsonValue {
                fn from(value: $ty) -> Self {
                    JsonValue(Value::from(value))
                }
            }
        )*
    };
}

// Non-finite floats become null, as serde_json does
scalar_conversions!(bool, i32, i64, f64, &str, String);

/// JSON type name of a raw value
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Paths
// =============================================================================

/// One step of a [`JsonPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, ".{}", key),
            PathSegment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Location of a node inside a document
///
/// ```
/// use serde_json::json;
/// use strata_core::JsonPath;
///
/// let doc = json!({"tags": ["a", "b"]});
/// let path = JsonPath::root().key("tags").index(1);
///
/// assert_eq!(path.to_string(), "tags[1]");
/// assert_eq!(path.resolve(&doc), Some(&json!("b")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct JsonPath(Vec<PathSegment>);

impl JsonPath {
    /// The whole document
    pub fn root() -> Self {
        JsonPath::default()
    }

    /// Extend with an object member
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.0.push(PathSegment::Key(key.into()));
        self
    }

    /// Extend with an array element
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathSegment::Index(index));
        self
    }

    /// True for the empty path
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Segments from the root down
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Path of the enclosing container plus the final step; `None` at the root
    pub fn split_last(&self) -> Option<(JsonPath, &PathSegment)> {
        let (last, container) = self.0.split_last()?;
        Some((JsonPath(container.to_vec()), last))
    }

    /// Node this path names inside `doc`
    ///
    /// A key applied to a non-object, or an index applied to a non-array,
    /// resolves to nothing.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(doc, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object()?.get(key),
            PathSegment::Index(index) => node.as_array()?.get(*index),
        })
    }

    /// Mutable counterpart of [`resolve`](Self::resolve)
    pub fn resolve_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(doc, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object_mut()?.get_mut(key),
            PathSegment::Index(index) => node.as_array_mut()?.get_mut(*index),
        })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => f.write_str(key)?,
                other => fmt::Display::fmt(other, f)?,
            }
        }
        Ok(())
    }
}
