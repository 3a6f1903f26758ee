//! Generation attempt state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a single generation attempt currently is.
///
/// ```text
/// idle       -> requesting
/// requesting -> validating
/// requesting -> failed
/// validating -> committed
/// validating -> failed
/// committed  -> idle
/// failed     -> idle
/// ```
///
/// `committed` and `failed` are terminal for the attempt; the session drops
/// back to `idle` right after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    #[default]
    Idle,
    Requesting,
    Validating,
    Committed,
    Failed,
}

impl AttemptState {
    /// Check whether `from -> to` is an edge of the attempt graph.
    pub fn is_valid_transition(from: AttemptState, to: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (from, to),
            (Idle, Requesting)
                | (Requesting, Validating)
                | (Requesting, Failed)
                | (Validating, Committed)
                | (Validating, Failed)
                | (Committed, Idle)
                | (Failed, Idle)
        )
    }

    /// `true` while a generation is outstanding.
    pub fn is_in_flight(self) -> bool {
        matches!(self, AttemptState::Requesting | AttemptState::Validating)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttemptState::Idle => "idle",
            AttemptState::Requesting => "requesting",
            AttemptState::Validating => "validating",
            AttemptState::Committed => "committed",
            AttemptState::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
