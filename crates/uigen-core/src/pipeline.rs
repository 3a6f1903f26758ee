//! Three-stage generation pipeline: plan -> code -> explanation.
//!
//! Each stage is one model call. Stages run strictly in order; the first
//! failure aborts the rest. The pipeline neither parses the plan text nor
//! touches the snapshot store.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::LanguageModel;
use crate::prompts::PromptTemplates;

/// One sequential model call within a generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Planning,
    Generation,
    Explanation,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Planning => "planning",
            Stage::Generation => "generation",
            Stage::Explanation => "explanation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong inside a stage.
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error("model call failed: {0:#}")]
    Call(anyhow::Error),

    #[error("model call timed out after {0:?}")]
    TimedOut(Duration),

    #[error("generation was cancelled")]
    Cancelled,
}

/// A failed pipeline run, with enough context for the caller to retry.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct PipelineError {
    pub stage: Stage,
    /// The user prompt of the failed attempt.
    pub prompt: String,
    /// The base code the attempt started from, if any.
    pub previous_code: Option<String>,
    #[source]
    pub cause: StageFailure,
}

/// Raw output of a successful run. `raw_plan` is still untrusted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub raw_plan: String,
    pub code: String,
    pub explanation: String,
}

/// Drives the planning, generation and explanation calls.
#[derive(Clone)]
pub struct GenerationPipeline {
    model: Arc<dyn LanguageModel>,
    templates: Arc<dyn PromptTemplates>,
    stage_timeout: Option<Duration>,
}

impl fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("model", &self.model.name())
            .field("stage_timeout", &self.stage_timeout)
            .finish()
    }
}

impl GenerationPipeline {
    pub fn new(model: Arc<dyn LanguageModel>, templates: Arc<dyn PromptTemplates>) -> Self {
        Self {
            model,
            templates,
            stage_timeout: None,
        }
    }

    /// Bound every stage's model call by `timeout`.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Run all three stages without external cancellation.
    pub async fn generate(
        &self,
        prompt: &str,
        previous_code: Option<&str>,
    ) -> Result<PipelineOutput, PipelineError> {
        self.generate_with_cancel(prompt, previous_code, &CancellationToken::new())
            .await
    }

    /// Run all three stages.
    ///
    /// Cancelling `cancel` aborts the in-flight call and skips every stage
    /// that has not started yet.
    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        previous_code: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let fail = |stage: Stage, cause: StageFailure| PipelineError {
            stage,
            prompt: prompt.to_string(),
            previous_code: previous_code.map(str::to_string),
            cause,
        };

        let planning_prompt = self.templates.planning(prompt, previous_code);
        let raw_plan = self
            .run_stage(Stage::Planning, &planning_prompt, cancel)
            .await
            .map_err(|cause| fail(Stage::Planning, cause))?;

        let generation_prompt = self.templates.generation(&raw_plan, previous_code);
        let code = self
            .run_stage(Stage::Generation, &generation_prompt, cancel)
            .await
            .map_err(|cause| fail(Stage::Generation, cause))?;

        let explanation_prompt = self.templates.explanation(&raw_plan, prompt);
        let explanation = self
            .run_stage(Stage::Explanation, &explanation_prompt, cancel)
            .await
            .map_err(|cause| fail(Stage::Explanation, cause))?;

        Ok(PipelineOutput {
            raw_plan,
            code,
            explanation,
        })
    }

    async fn run_stage(
        &self,
        stage: Stage,
        prompt_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, StageFailure> {
        if cancel.is_cancelled() {
            return Err(StageFailure::Cancelled);
        }

        debug!(stage = %stage, model = %self.model.name(), "stage started");

        let call = async {
            match self.stage_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.model.complete(prompt_text)).await {
                    Ok(result) => result.map_err(StageFailure::Call),
                    Err(_) => Err(StageFailure::TimedOut(limit)),
                },
                None => self
                    .model
                    .complete(prompt_text)
                    .await
                    .map_err(StageFailure::Call),
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StageFailure::Cancelled),
            result = call => result,
        };

        match &result {
            Ok(text) => info!(stage = %stage, response_len = text.len(), "stage finished"),
            Err(cause) => warn!(stage = %stage, error = %cause, "stage failed"),
        }
        result
    }
}
