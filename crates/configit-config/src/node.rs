// Helper functions for extracting values from KDL nodes

use kdl::{KdlNode, KdlValue};
use serde_json::{Number, Value};

use crate::{ConfigError, ConfigResult};

/// Positional (unnamed) arguments of a node.
pub(crate) fn args(node: &KdlNode) -> Vec<&KdlValue> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .map(|e| e.value())
        .collect()
}

pub(crate) fn string_arg(node: &KdlNode, index: usize) -> Option<String> {
    args(node)
        .get(index)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

pub(crate) fn string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

pub(crate) fn has_prop(node: &KdlNode, name: &str) -> bool {
    node.get(name).is_some()
}

/// A required string argument, reported as `what` when missing.
pub(crate) fn required_arg(node: &KdlNode, index: usize, what: &str) -> ConfigResult<String> {
    string_arg(node, index).ok_or_else(|| ConfigError::MissingField(what.to_string()))
}

/// Children of a node, empty when it has no block.
pub(crate) fn children(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|doc| doc.nodes()).unwrap_or_default()
}

/// Convert a KDL value into JSON.
pub(crate) fn to_json(value: &KdlValue, field: &str) -> ConfigResult<Value> {
    if let Some(s) = value.as_string() {
        Ok(Value::String(s.to_string()))
    } else if let Some(b) = value.as_bool() {
        Ok(Value::Bool(b))
    } else if let Some(i) = value.as_integer() {
        i64::try_from(i)
            .map(Value::from)
            .map_err(|_| ConfigError::invalid(field, format!("integer {i} is out of range")))
    } else if let Some(f) = value.as_float() {
        Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| ConfigError::invalid(field, format!("{f} is not a finite number")))
    } else {
        Ok(Value::Null)
    }
}
