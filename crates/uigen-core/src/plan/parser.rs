//! Plan text parser.
//!
//! The planning stage returns free text. Turning it into a plan happens in
//! two distinct steps so failures can be told apart:
//! 1. text -> [`serde_json::Value`] (fence stripping, JSON decoding,
//!    unwrapping the `{"components": [...]}` envelope);
//! 2. value -> `Vec<UiNode>` via [`validate_plan`].

use serde_json::Value;
use thiserror::Error;

use super::node::UiNode;
use super::validate::{ValidationError, validate_plan};

/// Key under which the planner is asked to place the node list.
pub const COMPONENTS_KEY: &str = "components";

/// Errors that can occur while turning plan text into a validated plan.
#[derive(Debug, Error)]
pub enum PlanParseError {
    #[error("plan text is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plan object has no `{COMPONENTS_KEY}` field")]
    MissingComponents,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Parse plan text into an untyped value, unwrapping the envelope.
///
/// Accepts either `{"components": <value>}` or a bare JSON value, optionally
/// wrapped in a Markdown code fence. The returned value is *not* validated.
pub fn parse_plan_value(text: &str) -> Result<Value, PlanParseError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body)?;

    match value {
        Value::Object(mut map) => map
            .remove(COMPONENTS_KEY)
            .ok_or(PlanParseError::MissingComponents),
        other => Ok(other),
    }
}

/// Parse and validate plan text.
pub fn parse_plan(text: &str) -> Result<Vec<UiNode>, PlanParseError> {
    let raw = parse_plan_value(text)?;
    Ok(validate_plan(&raw)?)
}

const FENCE: &str = "```";

/// Body of the first Markdown code fence, or the trimmed text when it is
/// already bare JSON or has no fence at all.
///
/// Prose around the fence is ignored, and an info string such as `json` may
/// run straight into the body (```` ```json{...}``` ````). An unterminated
/// fence extends to the end of the text.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with(['{', '[']) {
        return trimmed;
    }
    let Some(start) = trimmed.find(FENCE) else {
        return trimmed;
    };
    let rest = trimmed[start + FENCE.len()..]
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    match rest.find(FENCE) {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}
