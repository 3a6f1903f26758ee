//! Session behaviour knobs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Code shown before the first generation.
pub const INITIAL_CODE: &str = "// UI generation will go here";

/// Code shown after a failed generation under [`FailureDisplay::Placeholder`].
pub const DEFAULT_ERROR_PLACEHOLDER: &str = "// Error generating UI";

/// What the displayed artifact becomes when a generation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureDisplay {
    /// Replace the displayed code with a placeholder and clear the plan.
    #[default]
    Placeholder,
    /// Keep showing the last good artifact.
    Retain,
}

impl FailureDisplay {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureDisplay::Placeholder => "placeholder",
            FailureDisplay::Retain => "retain",
        }
    }
}

impl fmt::Display for FailureDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureDisplay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "placeholder" => Ok(FailureDisplay::Placeholder),
            "retain" => Ok(FailureDisplay::Retain),
            other => Err(format!(
                "invalid failure display {other:?} (expected placeholder or retain)"
            )),
        }
    }
}

/// Configuration for a [`super::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on each pipeline stage's model call.
    pub stage_timeout: Option<Duration>,
    pub failure_display: FailureDisplay,
    /// Code text shown after a failure when using the placeholder policy.
    pub error_placeholder: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stage_timeout: None,
            failure_display: FailureDisplay::default(),
            error_placeholder: DEFAULT_ERROR_PLACEHOLDER.to_string(),
        }
    }
}
