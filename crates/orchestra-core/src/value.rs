//! The tagged `Value` sum used for every heterogeneous parameter, context,
//! and output map in Orchestra (request context, step parameters, step
//! input/output, workflow input).
//!
//! The upstream system this was distilled from serialized all of these
//! through a single dynamically-typed map. Rather than carry that into a
//! statically typed rewrite, every such map here is `BTreeMap<String, Value>`
//! and coercions between representations (string <-> number, int <-> float)
//! are explicit, named functions instead of implicit `interface{}` conversions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A dynamically-shaped value used in request context, step parameters,
/// and step input/output maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Shorthand for constructing a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value as a string for template substitution and prompt
    /// embedding. Scalars render directly; `Map` renders its `content` leaf
    /// if present (the convention used by structured provider responses),
    /// otherwise falls back to compact JSON; `List`/other maps fall back to
    /// compact JSON too.
    pub fn as_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f}"),
            Value::String(s) => s.clone(),
            Value::Map(m) => {
                if let Some(Value::String(content)) = m.get("content") {
                    content.clone()
                } else {
                    serde_json::to_string(self).unwrap_or_default()
                }
            }
            Value::List(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Only string values participate in template substitution; this
    /// returns `Some` exactly when the template resolver is allowed to
    /// substitute this value directly into a string.
    pub fn as_template_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce to `f64` for numeric condition operators (`greater_than`,
    /// `less_than`). A `String` that parses cleanly as a float is accepted
    /// (the `adults: "2"` style coercion called out in the design notes);
    /// anything else returns `None` rather than panicking.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Coerce to `i64`, accepting an integral `Float` and a parseable
    /// `String` the same way `as_f64` does.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Coerce to `bool`. Accepts the literal bool and the strings
    /// `"true"`/`"false"` (case-insensitive).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Convenience alias for the maps that carry `Value`s throughout the system.
pub type ValueMap = BTreeMap<String, Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_coerces_to_number() {
        let v = Value::string("2");
        assert_eq!(v.as_i64(), Some(2));
        assert_eq!(v.as_f64(), Some(2.0));
    }

    #[test]
    fn int_promotes_to_float() {
        let v = Value::Int(4);
        assert_eq!(v.as_f64(), Some(4.0));
    }

    #[test]
    fn non_numeric_string_fails_coercion() {
        let v = Value::string("not-a-number");
        assert_eq!(v.as_f64(), None);
        assert_eq!(v.as_i64(), None);
    }

    #[test]
    fn map_with_content_leaf_displays_content() {
        let mut m = BTreeMap::new();
        m.insert("content".to_string(), Value::string("hello"));
        m.insert("tokens".to_string(), Value::Int(3));
        let v = Value::Map(m);
        assert_eq!(v.as_display_string(), "hello");
    }

    #[test]
    fn only_strings_are_template_substitutable() {
        assert!(Value::string("x").as_template_str().is_some());
        assert!(Value::Int(1).as_template_str().is_none());
        assert!(Value::List(vec![]).as_template_str().is_none());
    }
}
