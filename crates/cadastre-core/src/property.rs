//! Per-feature attribute values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single attribute value attached to a feature.
///
/// Source formats carry richer types (dates, blobs, nested JSON); ingest
/// folds them into this closed set so the attribute table has a fixed,
/// portable shape. Serializes as a bare JSON scalar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Absent or explicitly null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value. Integers are stored losslessly up to 2^53.
    Number(f64),
    /// Text value.
    String(String),
}

impl PropertyValue {
    /// Convert a JSON value. Arrays and objects are kept as their compact
    /// JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }

    /// Whether this is [`PropertyValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The value as a non-negative integer, if it is one.
    ///
    /// Integer-valued strings (`"17"`) are accepted: several formats store
    /// identifiers as text.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 => {
                if *n <= u64::MAX as f64 {
                    Some(*n as u64)
                } else {
                    None
                }
            }
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Ordered attribute map. Iteration order is the source column order.
pub type Properties = IndexMap<String, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_scalars_map_to_matching_variants() {
        assert_eq!(PropertyValue::from_json(&json!(null)), PropertyValue::Null);
        assert_eq!(PropertyValue::from_json(&json!(true)), PropertyValue::Bool(true));
        assert_eq!(PropertyValue::from_json(&json!(3)), PropertyValue::Number(3.0));
        assert_eq!(
            PropertyValue::from_json(&json!("via Roma")),
            PropertyValue::String("via Roma".into())
        );
    }

    #[test]
    fn nested_json_is_kept_as_text() {
        let v = PropertyValue::from_json(&json!({"a": [1, 2]}));
        assert_eq!(v, PropertyValue::String(r#"{"a":[1,2]}"#.into()));
    }

    #[test]
    fn as_u64_accepts_integral_numbers_and_strings() {
        assert_eq!(PropertyValue::Number(12.0).as_u64(), Some(12));
        assert_eq!(PropertyValue::String(" 40 ".into()).as_u64(), Some(40));
        assert_eq!(PropertyValue::Number(1.5).as_u64(), None);
        assert_eq!(PropertyValue::Number(-1.0).as_u64(), None);
        assert_eq!(PropertyValue::Bool(true).as_u64(), None);
    }

    #[test]
    fn serializes_as_bare_scalar() {
        let mut props = Properties::new();
        props.insert("name".into(), "parcel".into());
        props.insert("area".into(), 12.5.into());
        props.insert("built".into(), true.into());
        props.insert("note".into(), PropertyValue::Null);
        let text = serde_json::to_string(&props).unwrap();
        assert_eq!(
            text,
            r#"{"name":"parcel","area":12.5,"built":true,"note":null}"#
        );
    }
}
