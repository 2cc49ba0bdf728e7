//! Field values carried by primary keys

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A polymorphic field value that can hold the scalar types a key is made of
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Null,
}

impl FieldValue {
    /// Build a field value from a bean attribute
    ///
    /// Objects and arrays are not key material and map to `Null`.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::number).unwrap_or(FieldValue::Null),
            },
            _ => FieldValue::Null,
        }
    }

    /// Numeric value, whole numbers folded to `Integer`
    ///
    /// `3` and `3.0` are the same key value whichever side produced them.
    pub fn number(x: f64) -> Self {
        if x.fract() == 0.0 && x.abs() < i64::MAX as f64 {
            FieldValue::Integer(x as i64)
        } else {
            FieldValue::Float(x)
        }
    }

    /// Convert back to a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Null => Value::Null,
        }
    }

    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// A key field is set when it is neither null nor a blank string
    pub fn is_set(&self) -> bool {
        match self {
            FieldValue::Null => false,
            FieldValue::String(s) => !s.trim().is_empty(),
            _ => true,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

/// Type tag prefixed to each value of a serialized primary key
///
/// The tag is the first character of the entity's `pkMap` entry for the
/// field: `I` integer, `F`/`L` floating point, `B` boolean, anything else
/// is kept as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTag {
    Integer,
    Float,
    Boolean,
    Text,
}

impl KeyTag {
    pub fn from_prefix(tagged: &str) -> Self {
        match tagged.chars().next() {
            Some('I') => KeyTag::Integer,
            Some('F') | Some('L') => KeyTag::Float,
            Some('B') => KeyTag::Boolean,
            _ => KeyTag::Text,
        }
    }

    /// Coerce the raw text of a key value according to this tag
    ///
    /// Values that do not parse under their tag are kept as text.
    pub fn coerce(self, raw: &str) -> FieldValue {
        match self {
            KeyTag::Integer => raw
                .parse::<i64>()
                .map(FieldValue::Integer)
                .unwrap_or_else(|_| FieldValue::String(raw.to_string())),
            KeyTag::Float => raw
                .parse::<i64>()
                .map(FieldValue::Integer)
                .or_else(|_| raw.parse::<f64>().map(FieldValue::number))
                .unwrap_or_else(|_| FieldValue::String(raw.to_string())),
            KeyTag::Boolean => raw
                .to_lowercase()
                .parse::<bool>()
                .map(FieldValue::Boolean)
                .unwrap_or_else(|_| FieldValue::String(raw.to_string())),
            KeyTag::Text => FieldValue::String(raw.to_string()),
        }
    }
}
