//! Subprocess-backed language model.
//!
//! Runs a configured command (by default `claude -p`), writes the prompt to
//! its stdin and reads the full response from stdout.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::LanguageModel;

/// Language model adapter that shells out to a CLI.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    /// Default program, found via `$PATH`.
    pub const DEFAULT_PROGRAM: &str = "claude";

    /// Create an adapter for `program args...`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The command line this adapter runs, for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for CommandModel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROGRAM, vec!["-p".to_string()])
    }
}

#[async_trait]
impl LanguageModel for CommandModel {
    fn name(&self) -> &str {
        &self.program
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(program = %self.program, prompt_len = prompt.len(), "spawning model command");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn `{}`", self.command_line()))?;

        let mut stdin = child
            .stdin
            .take()
            .context("model command stdin was not captured")?;
        // Write concurrently with reading stdout so large prompts cannot
        // deadlock on a full pipe. Dropping stdin at the end sends EOF.
        let input = prompt.as_bytes().to_vec();
        let writer = tokio::spawn(async move { stdin.write_all(&input).await });

        let output = child
            .wait_with_output()
            .await
            .context("failed to wait for model command")?;

        let write_result = writer.await.context("prompt writer task panicked")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "`{}` exited with {}: {}",
                self.command_line(),
                output.status,
                stderr.trim()
            );
        }
        write_result.context("failed to write prompt to model command")?;

        let text = String::from_utf8(output.stdout)
            .context("model command produced non-UTF-8 output")?;
        let text = text.trim();
        if text.is_empty() {
            bail!("`{}` produced no output", self.command_line());
        }

        Ok(text.to_string())
    }
}
