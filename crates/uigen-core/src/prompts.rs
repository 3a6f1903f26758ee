//! Prompt construction for the three pipeline stages.
//!
//! Templates are pure functions of their inputs (no I/O). The pipeline owns
//! *when* they are called; implementors own *what* they say.

use crate::plan::COMPONENTS_KEY;

/// Builds the prompt text for each pipeline stage.
pub trait PromptTemplates: Send + Sync {
    /// Planning: user intent (+ current code) -> structural plan request.
    fn planning(&self, user_prompt: &str, previous_code: Option<&str>) -> String;

    /// Generation: plan text (+ current code) -> source code request.
    fn generation(&self, plan_text: &str, previous_code: Option<&str>) -> String;

    /// Explanation: plan text + user intent -> rationale request.
    fn explanation(&self, plan_text: &str, user_prompt: &str) -> String;
}

/// Output contract given to the planner.
const PLAN_SCHEMA: &str = r#"## Output format

Respond with JSON only, no prose and no code fences:

```json
{"components": [
  {"kind": "Box", "props": {"direction": "column"}, "children": [
    {"kind": "Text", "props": {"value": "Hello"}}
  ]}
]}
```

- Every node MUST have a non-empty string `kind`.
- `props` is optional and MUST be an object when present.
- `children` is optional and MUST be an array of nodes when present.
"#;

/// Built-in prompts for a React + TypeScript target.
#[derive(Debug, Clone, Default)]
pub struct DefaultTemplates;

impl PromptTemplates for DefaultTemplates {
    fn planning(&self, user_prompt: &str, previous_code: Option<&str>) -> String {
        let mut prompt = String::with_capacity(2048);

        prompt.push_str("# UI Planner\n\n");
        prompt.push_str(
            "You design user interfaces as a tree of components. \
             Produce the component tree that satisfies the request below.\n\n",
        );
        prompt.push_str(&format!(
            "The top-level object must contain a `{COMPONENTS_KEY}` array.\n\n"
        ));
        prompt.push_str(PLAN_SCHEMA);
        prompt.push('\n');

        if let Some(code) = previous_code {
            prompt.push_str("## Current implementation\n\n");
            prompt.push_str(
                "Modify this existing UI rather than starting over. \
                 Keep everything the request does not ask to change.\n\n",
            );
            push_fenced(&mut prompt, "tsx", code);
        }

        prompt.push_str("## Request\n\n");
        prompt.push_str(user_prompt.trim());
        prompt.push('\n');
        prompt
    }

    fn generation(&self, plan_text: &str, previous_code: Option<&str>) -> String {
        let mut prompt = String::with_capacity(2048);

        prompt.push_str("# UI Generator\n\n");
        prompt.push_str(
            "Write a single React function component in TypeScript that renders \
             exactly the component tree below. Respond with code only.\n\n",
        );
        prompt.push_str("## Component tree\n\n");
        push_fenced(&mut prompt, "json", plan_text);

        if let Some(code) = previous_code {
            prompt.push_str("## Previous code\n\n");
            prompt.push_str("Reuse names and structure from it where the tree allows.\n\n");
            push_fenced(&mut prompt, "tsx", code);
        }
        prompt
    }

    fn explanation(&self, plan_text: &str, user_prompt: &str) -> String {
        let mut prompt = String::with_capacity(1024);

        prompt.push_str("# UI Explainer\n\n");
        prompt.push_str(
            "In a few sentences of plain language, explain how the component tree \
             below answers the user's request and which layout choices were made.\n\n",
        );
        prompt.push_str("## Request\n\n");
        prompt.push_str(user_prompt.trim());
        prompt.push_str("\n\n## Component tree\n\n");
        push_fenced(&mut prompt, "json", plan_text);
        prompt
    }
}

fn push_fenced(prompt: &mut String, lang: &str, body: &str) {
    prompt.push_str("```");
    prompt.push_str(lang);
    prompt.push('\n');
    prompt.push_str(body.trim_end());
    prompt.push_str("\n```\n\n");
}
