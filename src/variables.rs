//! Per-context variable dictionary used for path substitution and `$name` equations.

use serde_json::{Map, Value};

use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::MediaTime;

/// Appendable/droppable string-keyed variable bindings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Variables {
    values: Map<String, Value>,
}

impl Variables {
    /// Empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite every entry of `map`.
    pub fn append(&mut self, map: &Map<String, Value>) {
        for (k, v) in map {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// Remove the keys listed in `map`. Values are ignored.
    pub fn drop_keys(&mut self, map: &Map<String, Value>) {
        for k in map.keys() {
            self.values.remove(k);
        }
    }

    /// Bind a single variable.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Raw value, if bound.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bound value or `MissingVariable`.
    pub fn resolve(&self, key: &str) -> MovingImagesResult<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| MovingImagesError::missing_variable(format!("'{key}' is not bound")))
    }

    /// Late-bound file path named by a `pathsubstitution` key.
    pub fn substitute_path(&self, key: &str) -> MovingImagesResult<String> {
        match self.resolve(key)? {
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            other => Err(MovingImagesError::invalid_parameter(format!(
                "path substitution '{key}' must be a non-empty string, got {other}"
            ))),
        }
    }

    /// Numeric view of a binding for equations: numbers, numeric strings, booleans and times
    /// (as seconds). `Ok(None)` when unbound.
    pub(crate) fn number(&self, key: &str) -> MovingImagesResult<Option<f64>> {
        let Some(v) = self.values.get(key) else {
            return Ok(None);
        };
        let n = match v {
            Value::Number(n) => n.as_f64(),
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Object(_) => MediaTime::from_json(v).ok().map(|t| t.seconds()),
            Value::Null | Value::Array(_) => None,
        };
        n.map(Some).ok_or_else(|| {
            MovingImagesError::invalid_parameter(format!("variable '{key}' is not numeric"))
        })
    }
}

#[cfg(test)]
#[path = "../tests/unit/variables.rs"]
mod tests;
