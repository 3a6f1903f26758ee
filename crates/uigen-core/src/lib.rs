//! Core of the prompt-driven UI generator.
//!
//! - [`plan`]: typed UI node tree, structural validation, plan text parsing.
//! - [`model`] / [`prompts`]: the language model boundary and stage prompts.
//! - [`pipeline`]: the plan -> code -> explanation generation run.
//! - [`snapshot`]: the append-only, branching version tree.
//! - [`session`]: the controller tying them together.

pub mod model;
pub mod pipeline;
pub mod plan;
pub mod prompts;
pub mod session;
pub mod snapshot;

pub use model::{CommandModel, LanguageModel};
pub use pipeline::{GenerationPipeline, PipelineError, PipelineOutput, Stage, StageFailure};
pub use plan::{PlanParseError, UiNode, ValidationError, validate_plan};
pub use prompts::{DefaultTemplates, PromptTemplates};
pub use session::{
    AttemptState, FailureDisplay, GenerationFailure, GenerationOutcome, Session, SessionConfig,
    SessionError, SessionView,
};
pub use snapshot::{NewSnapshot, Snapshot, SnapshotId, SnapshotStore, StoreError};
