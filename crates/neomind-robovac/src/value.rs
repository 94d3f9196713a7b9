//! Typed state values.
//!
//! Status payloads arrive as loosely-typed JSON. Everything written to the
//! state tree goes through [`StateValue`] so the store can compare values
//! for write-if-changed semantics and check them against declarations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value held by a state in the state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    /// Structured value (objects and arrays are kept as JSON)
    Json(Value),
    Null,
}

impl StateValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Data type a state should be declared with to hold this value.
    pub fn data_type(&self) -> StateDataType {
        match self {
            Self::Integer(_) | Self::Float(_) => StateDataType::Number,
            Self::String(_) => StateDataType::String,
            Self::Boolean(_) => StateDataType::Boolean,
            Self::Json(_) => StateDataType::Json,
            Self::Null => StateDataType::Mixed,
        }
    }

    /// Convert back to JSON for export.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(v) => Value::from(*v),
            Self::Float(v) => Value::from(*v),
            Self::String(v) => Value::from(v.as_str()),
            Self::Boolean(v) => Value::from(*v),
            Self::Json(v) => v.clone(),
            Self::Null => Value::Null,
        }
    }
}

impl From<&Value> for StateValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Json(value.clone()),
        }
    }
}

impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for StateValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for StateValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

/// Declared type of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateDataType {
    Number,
    String,
    Boolean,
    Json,
    #[default]
    Mixed,
}

impl StateDataType {
    /// Whether a value of the given type may be stored in a state of this type.
    pub fn accepts(&self, value: &StateValue) -> bool {
        match (self, value) {
            (Self::Mixed, _) | (_, StateValue::Null) => true,
            (Self::Number, StateValue::Integer(_) | StateValue::Float(_)) => true,
            (Self::String, StateValue::String(_)) => true,
            (Self::Boolean, StateValue::Boolean(_)) => true,
            (Self::Json, StateValue::Json(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for StateDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::Json => write!(f, "json"),
            Self::Mixed => write!(f, "mixed"),
        }
    }
}

/// Interpret a raw payload value as an integer code.
///
/// Accepts JSON integers and finite floats (truncated). Anything else,
/// including numeric strings, is not a code.
pub fn json_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        _ => None,
    }
}
