//! IR-006: Expression resolution — mode-aware evaluation of `<+...>` references.
//!
//! The engine does not evaluate expressions itself; it asks an
//! [`ExpressionEvaluator`]. [`ExpressionEvaluatorExt`] layers the resolution
//! modes on top of a bare lookup so every kind resolves fields the same way.

use super::errors::{InfraError, Result};
use super::field::FieldValue;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Root of provisioner output references: `<+provisioner.cluster>`.
pub const PROVISIONER_ROOT: &str = "provisioner";

/// What to do when an expression has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionMode {
    /// Fail with [`InfraError::Resolution`].
    ThrowOnUnresolved,
    /// Keep the expression text as the field's value.
    ReturnOriginalExpressionIfUnresolved,
    /// Drop the field.
    ReturnNullIfUnresolved,
}

impl fmt::Display for ExpressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThrowOnUnresolved => write!(f, "THROW_EXCEPTION_IF_UNRESOLVED"),
            Self::ReturnOriginalExpressionIfUnresolved => {
                write!(f, "RETURN_ORIGINAL_EXPRESSION_IF_UNRESOLVED")
            }
            Self::ReturnNullIfUnresolved => write!(f, "RETURN_NULL_IF_UNRESOLVED"),
        }
    }
}

/// Pipeline-owned expression engine.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate expression text. `Ok(None)` means the expression has no value.
    fn lookup(&self, expression: &str) -> Result<Option<Value>>;
}

/// Mode-aware helpers available on every evaluator.
pub trait ExpressionEvaluatorExt {
    /// Resolve a field. Literal, pending and already-resolved fields pass through.
    /// Returns `Ok(None)` only in [`ExpressionMode::ReturnNullIfUnresolved`].
    fn resolve_expression<T>(
        &self,
        field: &FieldValue<T>,
        mode: ExpressionMode,
    ) -> Result<Option<FieldValue<T>>>
    where
        T: DeserializeOwned + Clone;

    /// Resolve a field down to its concrete value.
    fn evaluate_expression<T>(&self, field: &FieldValue<T>, mode: ExpressionMode) -> Result<Option<T>>
    where
        T: DeserializeOwned + Clone,
    {
        Ok(self.resolve_expression(field, mode)?.and_then(FieldValue::into_value))
    }

    /// Evaluate an expression that must yield an array of host objects.
    fn evaluate_host_objects(&self, expression: &str) -> Result<Vec<Value>>;
}

impl<E: ExpressionEvaluator + ?Sized> ExpressionEvaluatorExt for E {
    fn resolve_expression<T>(
        &self,
        field: &FieldValue<T>,
        mode: ExpressionMode,
    ) -> Result<Option<FieldValue<T>>>
    where
        T: DeserializeOwned + Clone,
    {
        let FieldValue::Expression(text) = field else {
            return Ok(Some(field.clone()));
        };

        match self.lookup(text)?.filter(|v| !v.is_null()) {
            Some(raw) => {
                let value = typed_value::<T>(raw).map_err(|e| InfraError::Resolution {
                    expression: text.clone(),
                    reason: format!("value has the wrong type: {}", e),
                })?;
                Ok(Some(FieldValue::Expression(text.clone()).resolved(value)))
            }
            None => match mode {
                ExpressionMode::ThrowOnUnresolved => Err(InfraError::Resolution {
                    expression: text.clone(),
                    reason: "expression could not be resolved".to_string(),
                }),
                ExpressionMode::ReturnOriginalExpressionIfUnresolved => {
                    Ok(Some(FieldValue::Expression(text.clone())))
                }
                ExpressionMode::ReturnNullIfUnresolved => Ok(None),
            },
        }
    }

    fn evaluate_host_objects(&self, expression: &str) -> Result<Vec<Value>> {
        match self.lookup(expression)? {
            Some(Value::Array(hosts)) => Ok(hosts),
            Some(other) => Err(InfraError::Resolution {
                expression: expression.to_string(),
                reason: format!("expected a list of host objects, got {}", json_kind(&other)),
            }),
            None => Err(InfraError::Resolution {
                expression: expression.to_string(),
                reason: "expression could not be resolved".to_string(),
            }),
        }
    }
}

/// Convert a raw value to the field type. Scalars are accepted for string fields.
fn typed_value<T: DeserializeOwned>(raw: Value) -> std::result::Result<T, serde_json::Error> {
    match serde_json::from_value::<T>(raw.clone()) {
        Ok(v) => Ok(v),
        Err(e) => match raw {
            Value::Number(_) | Value::Bool(_) => {
                serde_json::from_value(Value::String(json_value_to_string(&raw)))
            }
            _ => Err(e),
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Render a JSON value the way it is interpolated into text.
pub fn json_value_to_string(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Walk a dotted path (`a.b[0].c`) into a JSON value.
pub fn json_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (name, indices) = match segment.find('[') {
            Some(i) => (&segment[..i], &segment[i..]),
            None => (segment, ""),
        };
        if !name.is_empty() {
            current = current.get(name)?;
        }
        for index in indices.split('[').filter(|s| !s.is_empty()) {
            let n: usize = index.strip_suffix(']')?.trim().parse().ok()?;
            current = current.get(n)?;
        }
    }
    Some(current)
}

// ============================================================================
// Provisioner output evaluator
// ============================================================================

/// Evaluator backed by a provisioner's output document.
///
/// Resolves `<+provisioner.PATH>` references. A field that is exactly one
/// reference takes the referenced value as-is; references embedded in text
/// are interpolated. Any other root is left unresolved.
#[derive(Debug, Clone, Default)]
pub struct ProvisionerOutputEvaluator {
    outputs: Value,
}

impl ProvisionerOutputEvaluator {
    pub fn new(outputs: Value) -> Self {
        Self { outputs }
    }

    fn reference(&self, inner: &str) -> Option<&Value> {
        let path = inner.trim().strip_prefix(PROVISIONER_ROOT)?;
        if path.is_empty() {
            return Some(&self.outputs);
        }
        let path = path.strip_prefix('.')?;
        json_path(&self.outputs, path).filter(|v| !v.is_null())
    }
}

impl ExpressionEvaluator for ProvisionerOutputEvaluator {
    fn lookup(&self, expression: &str) -> Result<Option<Value>> {
        let trimmed = expression.trim();
        if let Some(inner) = trimmed.strip_prefix("<+").and_then(|s| s.strip_suffix('>')) {
            if !inner.contains(['<', '>']) {
                return Ok(self.reference(inner).cloned());
            }
        }

        let mut result = expression.to_string();
        let mut start = 0;
        while let Some(open) = result[start..].find("<+") {
            let open = start + open;
            let Some(close) = result[open..].find('>') else {
                return Err(InfraError::Resolution {
                    expression: expression.to_string(),
                    reason: format!("unclosed expression at position {}", open),
                });
            };
            let close = open + close + 1;
            let Some(value) = self.reference(&result[open + 2..close - 1]) else {
                return Ok(None);
            };
            let value = json_value_to_string(value);
            result.replace_range(open..close, &value);
            start = open + value.len();
        }

        Ok(Some(Value::String(result)))
    }
}
