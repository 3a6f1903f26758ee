//! Structural validation of untrusted plan values.
//!
//! Turns a parsed but untyped [`serde_json::Value`] into a sequence of
//! [`UiNode`]s. The check is all-or-nothing: the first malformed node rejects
//! the whole plan and nothing is repaired.
//!
//! Rules:
//! - The plan root must be an array. An empty array is a valid, empty plan.
//! - Every node must be an object with a non-blank string `kind`.
//! - `props`, when present, must be an object.
//! - `children`, when present, must be an array of valid nodes.
//! - Nesting deeper than [`MAX_DEPTH`] is rejected.
//! - Any other field is preserved in [`UiNode::extra`].

use serde_json::{Map, Value};
use thiserror::Error;

use super::node::UiNode;

/// Deepest nesting level accepted for a single root.
pub const MAX_DEPTH: usize = 64;

/// Why a node was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("expected an array of nodes, found {0}")]
    NotAnArray(&'static str),

    #[error("expected a node object, found {0}")]
    NotAnObject(&'static str),

    #[error("node has no `kind` field")]
    MissingKind,

    #[error("`kind` must be a string, found {0}")]
    KindNotString(&'static str),

    #[error("`kind` is empty")]
    EmptyKind,

    #[error("`props` must be an object, found {0}")]
    PropsNotObject(&'static str),

    #[error("`children` must be an array, found {0}")]
    ChildrenNotArray(&'static str),

    #[error("nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,
}

/// A structural plan mismatch, located by a JSONPath-like node path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid plan at {path}: {reason}")]
pub struct ValidationError {
    /// Path of the offending node, e.g. `$[0].children[2]`.
    pub path: String,
    pub reason: ValidationFailure,
}

impl ValidationError {
    fn new(path: &str, reason: ValidationFailure) -> Self {
        Self {
            path: path.to_string(),
            reason,
        }
    }
}

/// Validate a raw plan value and convert it into typed nodes.
pub fn validate_plan(raw: &Value) -> Result<Vec<UiNode>, ValidationError> {
    validate_nodes(raw, "$", 1)
}

fn validate_nodes(raw: &Value, path: &str, depth: usize) -> Result<Vec<UiNode>, ValidationError> {
    let items = raw
        .as_array()
        .ok_or_else(|| ValidationError::new(path, ValidationFailure::NotAnArray(type_name(raw))))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| validate_node(item, &format!("{path}[{i}]"), depth))
        .collect()
}

fn validate_node(raw: &Value, path: &str, depth: usize) -> Result<UiNode, ValidationError> {
    if depth > MAX_DEPTH {
        return Err(ValidationError::new(path, ValidationFailure::TooDeep));
    }

    let object = raw
        .as_object()
        .ok_or_else(|| ValidationError::new(path, ValidationFailure::NotAnObject(type_name(raw))))?;

    let kind = match object.get("kind") {
        None => return Err(ValidationError::new(path, ValidationFailure::MissingKind)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(ValidationError::new(path, ValidationFailure::EmptyKind));
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(ValidationError::new(
                path,
                ValidationFailure::KindNotString(type_name(other)),
            ));
        }
    };

    let props = match object.get("props") {
        None => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(other) => {
            return Err(ValidationError::new(
                path,
                ValidationFailure::PropsNotObject(type_name(other)),
            ));
        }
    };

    let children = match object.get("children") {
        None => Vec::new(),
        Some(value @ Value::Array(_)) => {
            validate_nodes(value, &format!("{path}.children"), depth + 1)?
        }
        Some(other) => {
            return Err(ValidationError::new(
                path,
                ValidationFailure::ChildrenNotArray(type_name(other)),
            ));
        }
    };

    let extra: Map<String, Value> = object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "kind" | "props" | "children"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(UiNode {
        kind,
        props,
        children,
        extra,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
