//! Shared test utilities for uigen integration tests.
//!
//! Provides [`ScriptedModel`], a [`LanguageModel`] that replays queued
//! responses in order and records every prompt it receives, plus small
//! helpers for building sessions and plan text.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use uigen_core::{DefaultTemplates, GenerationPipeline, LanguageModel, Session, SessionConfig};

/// Plan text for `[ {kind: "Box", children: [{kind: "Text"}]} ]`.
pub const BOX_WITH_TEXT: &str =
    r#"{"components": [{"kind": "Box", "children": [{"kind": "Text"}]}]}"#;

/// Plan text whose only node lacks `kind`.
pub const MISSING_KIND: &str = r#"{"components": [{"props": {"x": 1}}]}"#;

enum Step {
    Reply(String),
    Fail(String),
    /// Wait for [`ScriptedModel::release`], then reply.
    Held(String),
}

/// A language model driven by a script of responses.
///
/// Calls past the end of the script fail with "script exhausted".
#[derive(Clone, Default)]
pub struct ScriptedModel {
    steps: Arc<Mutex<VecDeque<Step>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    gate: Arc<Notify>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Step::Reply(text.into()))
    }

    /// Queue a failing call.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Step::Fail(message.into()))
    }

    /// Queue a reply that is only delivered after [`Self::release`].
    pub fn held_reply(self, text: impl Into<String>) -> Self {
        self.push(Step::Held(text.into()))
    }

    /// Queue the three replies of one successful generation.
    pub fn generation(self, plan: &str, code: &str, explanation: &str) -> Self {
        self.reply(plan).reply(code).reply(explanation)
    }

    /// Let one held call proceed.
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Every prompt received so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn push(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(text),
            Some(Step::Fail(message)) => Err(anyhow!(message)),
            Some(Step::Held(text)) => {
                self.gate.notified().await;
                Ok(text)
            }
            None => Err(anyhow!("script exhausted")),
        }
    }
}

/// Build a session over `model` with default templates.
pub fn session_with(model: &ScriptedModel, config: SessionConfig) -> Session {
    let pipeline = GenerationPipeline::new(Arc::new(model.clone()), Arc::new(DefaultTemplates));
    Session::new(pipeline, config)
}

/// Plan text with one `Text` node per label, in the `components` envelope.
pub fn text_plan(labels: &[&str]) -> String {
    let nodes: Vec<_> = labels
        .iter()
        .map(|label| json!({ "kind": "Text", "props": { "value": label } }))
        .collect();
    json!({ "components": nodes }).to_string()
}
