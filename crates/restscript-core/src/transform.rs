//! Filters and projections applied to response bodies.
//!
//! Filters use a small jq-style subset:
//!
//! | Expression       | Result                                   |
//! |------------------|------------------------------------------|
//! | `.`              | identity                                 |
//! | `.a.b`           | nested field, null when missing          |
//! | `.[n]`           | list index, negative counts from the end |
//! | `.[start:end]`   | list slice                               |
//! | `.[]`            | list items (or map values)               |
//! | `.[].field`      | field of every item, nulls dropped       |
//! | `.[n].field`     | field of one item                        |
//! | `length`, `keys`, `values`, `type`, `first`, `last` | builtins |
//!
//! Projections keep only selected fields; see [`apply_projection`].

use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::TransformError;
use crate::value::Value;

/// The filter and projection functions the executor applies after a request.
pub trait Transforms: Send + Sync {
    /// Applies an inline filter expression.
    fn filter(&self, data: &Value, expr: &str) -> Result<Value, TransformError>;

    /// Looks up a named filter's expression.
    fn named_filter(&self, name: &str) -> Option<String>;

    /// Applies a named projection.
    fn project(&self, data: &Value, name: &str) -> Result<Value, TransformError>;
}

/// Built-in transforms with named filters and projections from config.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTransforms {
    filters: BTreeMap<String, String>,
    projections: BTreeMap<String, Value>,
}

impl BuiltinTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            filters: config.filters.clone(),
            projections: config.projections.clone(),
        }
    }

    pub fn with_filter(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.filters.insert(name.into(), expr.into());
        self
    }

    pub fn with_projection(mut self, name: impl Into<String>, spec: Value) -> Self {
        self.projections.insert(name.into(), spec);
        self
    }
}

impl Transforms for BuiltinTransforms {
    fn filter(&self, data: &Value, expr: &str) -> Result<Value, TransformError> {
        apply_filter(data, expr)
    }

    fn named_filter(&self, name: &str) -> Option<String> {
        self.filters.get(name).cloned()
    }

    fn project(&self, data: &Value, name: &str) -> Result<Value, TransformError> {
        let spec = self
            .projections
            .get(name)
            .ok_or_else(|| TransformError::ProjectionNotFound(name.to_string()))?;
        Ok(apply_projection(data, spec))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Field(String),
    Index(i64),
    Slice(Option<i64>, Option<i64>),
    Iterate,
}

/// Applies a filter expression to `data`.
pub fn apply_filter(data: &Value, expr: &str) -> Result<Value, TransformError> {
    let expr = expr.trim();
    let invalid = |message: &str| TransformError::InvalidFilter {
        expr: expr.to_string(),
        message: message.to_string(),
    };

    match expr {
        "" | "." => return Ok(data.clone()),
        "length" => {
            return match data {
                Value::List(items) => Ok(Value::Integer(items.len() as i64)),
                Value::Map(map) => Ok(Value::Integer(map.len() as i64)),
                Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
                Value::Null => Ok(Value::Integer(0)),
                Value::Integer(i) => Ok(Value::Integer(i.saturating_abs())),
                Value::Number(n) => Ok(Value::Number(n.abs())),
                Value::Bool(_) => Err(invalid("boolean has no length")),
            }
        }
        "keys" => {
            return match data {
                Value::Map(map) => Ok(Value::List(map.keys().cloned().map(Value::String).collect())),
                Value::List(items) => {
                    Ok(Value::List((0..items.len()).map(|i| Value::Integer(i as i64)).collect()))
                }
                other => Err(invalid(&format!("{} has no keys", other.type_name()))),
            }
        }
        "values" => {
            return match data {
                Value::Map(map) => Ok(Value::List(map.values().cloned().collect())),
                Value::List(_) => Ok(data.clone()),
                other => Err(invalid(&format!("{} has no values", other.type_name()))),
            }
        }
        "type" => return Ok(Value::String(data.type_name().to_string())),
        "first" | "last" => {
            return match data {
                Value::List(items) => {
                    let item = if expr == "first" { items.first() } else { items.last() };
                    Ok(item.cloned().unwrap_or(Value::Null))
                }
                Value::Null => Ok(Value::Null),
                other => Err(invalid(&format!("cannot take {} of a {}", expr, other.type_name()))),
            }
        }
        _ => {}
    }

    let steps = parse_steps(expr).map_err(|m| invalid(&m))?;
    Ok(eval_steps(data, &steps))
}

fn parse_steps(expr: &str) -> Result<Vec<Step>, String> {
    if !expr.starts_with('.') {
        return Err("expected a path starting with '.' or a builtin".to_string());
    }
    let chars: Vec<char> = expr.chars().collect();
    let mut steps = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                if pos >= chars.len() {
                    return Err("trailing '.'".to_string());
                }
                if chars[pos] == '[' {
                    continue;
                }
                let start = pos;
                while pos < chars.len() && !matches!(chars[pos], '.' | '[') {
                    pos += 1;
                }
                let name: String = chars[start..pos].iter().collect();
                if name.is_empty() || name.chars().any(char::is_whitespace) {
                    return Err(format!("invalid field name '{}'", name));
                }
                steps.push(Step::Field(name));
            }
            '[' => {
                let close = chars[pos..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|offset| pos + offset)
                    .ok_or("unclosed '['")?;
                let inner: String = chars[pos + 1..close].iter().collect();
                steps.push(parse_bracket(inner.trim())?);
                pos = close + 1;
            }
            other => return Err(format!("unexpected '{}'", other)),
        }
    }
    Ok(steps)
}

fn parse_bracket(inner: &str) -> Result<Step, String> {
    let int = |s: &str| -> Result<Option<i64>, String> {
        let s = s.trim();
        if s.is_empty() {
            Ok(None)
        } else {
            s.parse().map(Some).map_err(|_| format!("'{}' is not an integer", s))
        }
    };
    if inner.is_empty() || inner == "*" {
        return Ok(Step::Iterate);
    }
    if let Some((start, end)) = inner.split_once(':') {
        return Ok(Step::Slice(int(start)?, int(end)?));
    }
    int(inner)?
        .map(Step::Index)
        .ok_or_else(|| "empty index".to_string())
}

fn eval_steps(data: &Value, steps: &[Step]) -> Value {
    let Some((step, rest)) = steps.split_first() else {
        return data.clone();
    };
    match step {
        Step::Field(name) => match data {
            Value::Map(map) => eval_steps(map.get(name).unwrap_or(&Value::Null), rest),
            _ => Value::Null,
        },
        Step::Index(index) => match data {
            Value::List(items) => match normalize_index(*index, items.len()) {
                Some(i) => eval_steps(&items[i], rest),
                None => Value::Null,
            },
            _ => Value::Null,
        },
        Step::Slice(start, end) => match data {
            Value::List(items) => {
                let (from, to) = slice_bounds(*start, *end, items.len());
                eval_steps(&Value::List(items[from..to].to_vec()), rest)
            }
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (from, to) = slice_bounds(*start, *end, chars.len());
                eval_steps(&Value::String(chars[from..to].iter().collect()), rest)
            }
            _ => Value::Null,
        },
        Step::Iterate => {
            let items: Vec<&Value> = match data {
                Value::List(items) => items.iter().collect(),
                Value::Map(map) => map.values().collect(),
                _ => return Value::Null,
            };
            let mapped = items.into_iter().map(|item| eval_steps(item, rest));
            if rest.is_empty() {
                Value::List(mapped.collect())
            } else {
                Value::List(mapped.filter(|v| *v != Value::Null).collect())
            }
        }
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

fn slice_bounds(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let clamp = |v: i64| -> usize {
        let len = len as i64;
        let v = if v < 0 { len + v } else { v };
        v.clamp(0, len) as usize
    };
    let from = start.map(clamp).unwrap_or(0);
    let to = end.map(clamp).unwrap_or(len);
    (from, to.max(from))
}

/// Keeps only the fields named by `spec`, element-wise for lists.
///
/// A spec is a list of field names, where an entry may be a map
/// `{field: [subfields]}`, or a map of `field: true | [subfields] | {nested}`.
/// A comma-separated string is read as a list. Non-map items pass through.
pub fn apply_projection(data: &Value, spec: &Value) -> Value {
    match data {
        Value::List(items) => Value::List(items.iter().map(|item| project_item(item, spec)).collect()),
        other => project_item(other, spec),
    }
}

fn project_item(item: &Value, spec: &Value) -> Value {
    let Value::Map(map) = item else {
        return item.clone();
    };
    match spec {
        Value::List(fields) => project_fields(map, fields),
        Value::Map(nested) => project_nested(map, nested),
        Value::String(s) => {
            let fields: Vec<Value> = s
                .split(',')
                .map(|f| Value::String(f.trim().to_string()))
                .collect();
            project_fields(map, &fields)
        }
        _ => item.clone(),
    }
}

fn project_fields(item: &BTreeMap<String, Value>, fields: &[Value]) -> Value {
    let mut result = BTreeMap::new();
    for field in fields {
        match field {
            Value::String(name) => {
                if let Some(v) = item.get(name) {
                    result.insert(name.clone(), v.clone());
                }
            }
            Value::Map(nested) => {
                for (key, sub) in nested {
                    match (item.get(key), sub) {
                        (Some(Value::Map(inner)), Value::List(subfields)) => {
                            result.insert(key.clone(), project_fields(inner, subfields));
                        }
                        (Some(v), _) => {
                            result.insert(key.clone(), v.clone());
                        }
                        (None, _) => {}
                    }
                }
            }
            _ => {}
        }
    }
    Value::Map(result)
}

fn project_nested(item: &BTreeMap<String, Value>, spec: &BTreeMap<String, Value>) -> Value {
    let mut result = BTreeMap::new();
    for (field, sub) in spec {
        let Some(value) = item.get(field) else { continue };
        let projected = match (sub, value) {
            (Value::Null | Value::Bool(true), v) => v.clone(),
            (Value::Bool(false), _) => continue,
            (Value::List(subfields), Value::Map(inner)) => project_fields(inner, subfields),
            (Value::List(subfields), Value::List(items)) => Value::List(
                items
                    .iter()
                    .map(|i| match i {
                        Value::Map(inner) => project_fields(inner, subfields),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            (Value::Map(nested), Value::Map(inner)) => project_nested(inner, nested),
            (_, v) => v.clone(),
        };
        result.insert(field.clone(), projected);
    }
    Value::Map(result)
}
