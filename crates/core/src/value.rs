//! Scalar and structured-scalar payload values.
//!
//! `Value` is the leaf type for payload fields that do not hold entities.
//! Entity-valued fields (including containers of entities) are modeled one
//! level up, in `encr_core::entity::FieldValue`, which wraps either a
//! `Value` or an `Entity` — `Value` itself never names an entity.
//!
//! Maps use an ordered `Vec<(String, Value)>` rather than `HashMap` so that
//! two values built from the same sequence of inserts compare equal and
//! hash the same bytes when fed to the content-addressing hash (§4.1
//! requires that storing identical payloads again be a no-op, which in turn
//! requires a stable byte encoding).

use serde::{Deserialize, Serialize};

/// A scalar or structured-scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Ordered string-keyed map of values.
    Map(Vec<(String, Value)>),
}

impl Value {
    /// Convenience constructor for a string value from any `Into<String>`.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// `true` if this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Look up a key in a [`Value::Map`]; `None` for any other variant or a
    /// missing key.
    pub fn map_get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(false).is_null());
    }

    #[test]
    fn map_get_finds_key() {
        let v = Value::Map(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Int(2)),
        ]);
        assert_eq!(v.map_get("b"), Some(&Value::Int(2)));
        assert_eq!(v.map_get("missing"), None);
    }

    #[test]
    fn map_get_on_non_map_is_none() {
        assert_eq!(Value::Int(5).map_get("anything"), None);
    }

    #[test]
    fn conversions_round_trip() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from("hi"), Value::String("hi".to_string()));
    }

    #[test]
    fn serialization_round_trips_all_variants() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-7),
            Value::Float(2.5),
            Value::string("hello"),
            Value::Bytes(vec![1, 2, 3]),
            Value::Array(vec![Value::Int(1), Value::Bool(false)]),
            Value::Map(vec![("k".to_string(), Value::Int(9))]),
        ];
        for value in values {
            let encoded = serde_json::to_string(&value).unwrap();
            let decoded: Value = serde_json::from_str(&encoded).unwrap();
            assert_eq!(value, decoded);
        }
    }

    #[test]
    fn equal_maps_built_in_same_order_are_equal() {
        let a = Value::Map(vec![("x".to_string(), Value::Int(1))]);
        let b = Value::Map(vec![("x".to_string(), Value::Int(1))]);
        assert_eq!(a, b);
    }
}
