use std::collections::HashMap;

use crate::ast::{CompareOp, Expression, Segment, VarPath};
use crate::error::EvalError;
use crate::value::Value;

/// Per-execution variable environment.
///
/// One store is created for every script run and dropped when the run
/// returns, so nothing bound here is visible to any other run.
#[derive(Debug, Default)]
pub struct VariableStore {
    variables: HashMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with named run parameters.
    pub fn with_params<'a>(params: impl IntoIterator<Item = (&'a String, &'a Value)>) -> Self {
        let mut store = Self::new();
        for (name, value) in params {
            store.set(name.clone(), value.clone());
        }
        store
    }

    pub fn set(&mut self, name: String, value: Value) {
        self.variables.insert(name, value);
    }

    /// Assigns through a dotted path, creating intermediate maps.
    pub fn set_path(&mut self, target: &VarPath, value: Value) {
        if target.path.is_empty() {
            self.set(target.name.clone(), value);
            return;
        }
        let root = self.variables.entry(target.name.clone()).or_default();
        root.set_path(&target.path, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Reads `$name.path`. A missing root variable is an error; a missing
    /// key further down reads as null.
    pub fn resolve(&self, var: &VarPath) -> Result<Value, EvalError> {
        let root = self
            .get(&var.name)
            .ok_or_else(|| EvalError::UndefinedVariable(var.name.clone()))?;
        root.lookup(&var.path).map_err(|e| match e {
            EvalError::Path { message, .. } => EvalError::Path {
                path: var.to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn eval(&self, expr: &Expression) -> Result<Value, EvalError> {
        match expr {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(var) => self.resolve(var),
            Expression::Template(segments) => self.render(segments).map(Value::String),
        }
    }

    /// Substitutes every `$var` in a template with its rendered form.
    pub fn render(&self, segments: &[Segment]) -> Result<String, EvalError> {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(var) => out.push_str(&self.resolve(var)?.to_string()),
            }
        }
        Ok(out)
    }
}

/// Applies one comparison operator.
///
/// Ordering operators coerce both sides to numbers when either side is a
/// number, fall back to string ordering for two strings, and fail otherwise.
/// `in` tests list membership, substring containment or map keys.
pub fn compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => Ok(left.loose_eq(right)),
        CompareOp::NotEq => Ok(!left.loose_eq(right)),
        CompareOp::In => contains(right, left, op),
        CompareOp::NotIn => contains(right, left, op).map(|found| !found),
        CompareOp::Gt | CompareOp::Lt | CompareOp::GtEq | CompareOp::LtEq => {
            let ordering = order(left, op, right)?;
            Ok(match op {
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::GtEq => ordering.is_ge(),
                _ => ordering.is_le(),
            })
        }
    }
}

fn order(left: &Value, op: CompareOp, right: &Value) -> Result<std::cmp::Ordering, EvalError> {
    let incomparable = || EvalError::Incomparable {
        left: left.type_name().to_string(),
        op: op.symbol(),
        right: right.type_name().to_string(),
    };

    if left.is_number() || right.is_number() {
        return left.numeric_cmp(right).ok_or_else(incomparable);
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(incomparable()),
    }
}

fn contains(haystack: &Value, needle: &Value, op: CompareOp) -> Result<bool, EvalError> {
    match haystack {
        Value::List(items) => Ok(items.iter().any(|item| item.loose_eq(needle))),
        Value::String(s) => Ok(s.contains(&needle.to_string())),
        Value::Map(map) => Ok(map.contains_key(&needle.to_string())),
        other => Err(EvalError::Incomparable {
            left: needle.type_name().to_string(),
            op: op.symbol(),
            right: other.type_name().to_string(),
        }),
    }
}
