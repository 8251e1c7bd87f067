//! Canonical property value representation shared by the storage codec, the
//! filter evaluator, and the sort comparator.
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Property map attached to nodes and relationships.
pub type Properties = BTreeMap<String, Value>;

/// A property value. Serialized as plain JSON, one document per property column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Nested list; opaque to ordering.
    List(Vec<Value>),
    /// Nested map; opaque to ordering.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true when the value has a natural ordering (everything except
    /// nested lists and maps).
    pub fn is_orderable(&self) -> bool {
        !matches!(self, Value::List(_) | Value::Map(_))
    }

    /// Returns the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Compares two values.
    ///
    /// Null equals null and sorts below every non-null value. Integers and
    /// floats are compared exactly, without rounding the integer. Values
    /// without a shared natural ordering (mismatched kinds, lists, maps, NaN)
    /// yield `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => int_cmp_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => int_cmp_float(*b, *a).map(Ordering::reverse),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }
}

// 2^63 as f64; every finite float in [-2^63, 2^63) floors to a valid i64.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Exact `a <=> b` for an integer and a float. NaN has no order.
fn int_cmp_float(a: i64, b: f64) -> Option<Ordering> {
    if b.is_nan() {
        return None;
    }
    if b >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if b < -I64_BOUND {
        return Some(Ordering::Greater);
    }
    let floor = b.floor();
    match a.cmp(&(floor as i64)) {
        Ordering::Equal if b > floor => Some(Ordering::Less),
        ord => Some(ord),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::List(v) => write!(f, "list(len={})", v.len()),
            Value::Map(v) => write!(f, "map(len={})", v.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

/// Builds a property map from key/value pairs.
pub fn properties<K, V, I>(pairs: I) -> Properties
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape_is_plain() {
        let v: Value = serde_json::from_str("5").unwrap();
        assert_eq!(v, Value::Int(5));
        let v: Value = serde_json::from_str("5.5").unwrap();
        assert_eq!(v, Value::Float(5.5));
        let v: Value = serde_json::from_str("null").unwrap();
        assert_eq!(v, Value::Null);
        let v: Value = serde_json::from_str(r#"{"a":[1,"x",true]}"#).unwrap();
        let expected = Value::Map(properties([(
            "a",
            Value::List(vec![Value::Int(1), Value::from("x"), Value::Bool(true)]),
        )]));
        assert_eq!(v, expected);
        assert_eq!(serde_json::to_string(&Value::from("hi")).unwrap(), "\"hi\"");
    }

    #[test]
    fn null_sorts_below_values() {
        assert_eq!(Value::Null.compare(&Value::Null), Some(Ordering::Equal));
        assert_eq!(Value::Null.compare(&Value::Int(0)), Some(Ordering::Less));
        assert_eq!(Value::from("a").compare(&Value::Null), Some(Ordering::Greater));
    }

    #[test]
    fn mixed_width_numbers_compare_exactly() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.0)), Some(Ordering::Equal));
        assert_eq!(Value::Float(1.5).compare(&Value::Int(2)), Some(Ordering::Less));
        assert_eq!(Value::Int(-2).compare(&Value::Float(-1.5)), Some(Ordering::Less));
        assert_eq!(Value::Int(-1).compare(&Value::Float(-1.5)), Some(Ordering::Greater));

        let big = 1_i64 << 53;
        let float = Value::Float(big as f64);
        assert_eq!(Value::Int(big).compare(&float), Some(Ordering::Equal));
        assert_eq!(Value::Int(big + 1).compare(&float), Some(Ordering::Greater));
        assert_eq!(float.compare(&Value::Int(big + 1)), Some(Ordering::Less));
        assert_eq!(Value::Int(big - 1).compare(&float), Some(Ordering::Less));

        assert_eq!(
            Value::Int(i64::MAX).compare(&Value::Float(I64_BOUND)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Int(i64::MIN).compare(&Value::Float(-I64_BOUND)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Int(i64::MIN).compare(&Value::Float(f64::NEG_INFINITY)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int(0).compare(&Value::Float(f64::NAN)), None);
    }

    #[test]
    fn incompatible_kinds_have_no_order() {
        assert_eq!(Value::Int(1).compare(&Value::from("1")), None);
        assert_eq!(Value::List(vec![]).compare(&Value::List(vec![])), None);
        assert!(!Value::Map(BTreeMap::new()).is_orderable());
        assert!(Value::Bool(true).is_orderable());
    }
}
