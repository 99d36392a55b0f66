//! Dynamically-typed values held in a script's variable store.
//!
//! Every value produced by a script (literals, HTTP response bodies,
//! filter output) is a [`Value`]. It is a closed union so that comparison,
//! filtering and projection can match on it exhaustively.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// A script value: null, bool, number, string, list or map.
///
/// Integers are held exactly in [`Value::Integer`]; only non-integral or
/// out-of-range numbers become [`Value::Number`]. Equality treats the two
/// numeric variants as one numeric type.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::List(_) | Value::Map(_) => {
                let json = serde_json::Value::from(self);
                write!(f, "{}", json)
            }
        }
    }
}

/// Formats a number without a trailing `.0` when it is integral.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => a.numeric_cmp(b) == Some(Ordering::Equal),
            _ => false,
        }
    }
}

impl Value {
    /// Short type name used in error messages and by the `type` filter.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "array",
            Value::Map(_) => "object",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Number(_))
    }

    /// Coerces the value to a number if it has a numeric reading.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Exact integer reading: integers, integral floats in range, integer
    /// strings and bools.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.2e18 => {
                Some(*n as i64)
            }
            Value::String(s) => s.trim().parse().ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Orders two values by their numeric readings.
    ///
    /// Exact when both sides read as integers, floating point otherwise.
    /// `None` when either side has no numeric reading.
    pub fn numeric_cmp(&self, other: &Value) -> Option<Ordering> {
        match (self.as_integer(), other.as_integer()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => self.as_number()?.partial_cmp(&other.as_number()?),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
        }
    }

    /// Equality used by assertions.
    ///
    /// Numbers compare numerically against anything with a numeric reading,
    /// strings compare against booleans by rendered form, everything else is
    /// structural.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_number() || b.is_number() => {
                let scalar = |v: &Value| {
                    v.is_number() || matches!(v, Value::String(_) | Value::Bool(_))
                };
                scalar(a) && scalar(b) && a.numeric_cmp(b) == Some(Ordering::Equal)
            }
            (Value::String(a), Value::Bool(b)) | (Value::Bool(b), Value::String(a)) => {
                *a == b.to_string()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.loose_eq(w)))
            }
            (a, b) => a == b,
        }
    }

    /// Reads a dotted path (`body.items.0.id`) out of this value.
    ///
    /// A missing map key or out-of-range index yields [`Value::Null`];
    /// stepping into a scalar is an error.
    pub fn lookup(&self, path: &[String]) -> Result<Value, EvalError> {
        let mut current = self;
        for (depth, segment) in path.iter().enumerate() {
            current = match current {
                Value::Map(map) => match map.get(segment) {
                    Some(v) => v,
                    None => return Ok(Value::Null),
                },
                Value::List(items) => {
                    let index: usize = segment.parse().map_err(|_| EvalError::Path {
                        path: path[..=depth].join("."),
                        message: format!("'{}' is not a list index", segment),
                    })?;
                    match items.get(index) {
                        Some(v) => v,
                        None => return Ok(Value::Null),
                    }
                }
                Value::Null => return Ok(Value::Null),
                other => {
                    return Err(EvalError::Path {
                        path: path[..=depth].join("."),
                        message: format!("cannot read '{}' from a {}", segment, other.type_name()),
                    })
                }
            };
        }
        Ok(current.clone())
    }

    /// Writes `value` at a dotted path, creating intermediate maps.
    pub fn set_path(&mut self, path: &[String], value: Value) {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return;
        };
        let mut current = self;
        for segment in parents {
            if !matches!(current, Value::Map(_)) {
                *current = Value::Map(BTreeMap::new());
            }
            let Value::Map(map) = current else { unreachable!() };
            current = map.entry(segment.clone()).or_insert(Value::Null);
        }
        if !matches!(current, Value::Map(_)) {
            *current = Value::Map(BTreeMap::new());
        }
        if let Value::Map(map) = current {
            map.insert(last.clone(), value);
        }
    }

    /// Pretty JSON for lists and maps, plain rendering otherwise.
    pub fn to_pretty(&self) -> String {
        match self {
            Value::List(_) | Value::Map(_) => {
                serde_json::to_string_pretty(&serde_json::Value::from(self))
                    .unwrap_or_else(|_| self.to_string())
            }
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
                    serde_json::Value::from(*n as i64)
                } else {
                    serde_json::Number::from_f64(*n)
                        .map(serde_json::Value::Number)
                        .unwrap_or(serde_json::Value::Null)
                }
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Into::into).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
