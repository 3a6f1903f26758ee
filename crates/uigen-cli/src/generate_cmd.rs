//! `uigen generate`: one prompt, one snapshot, code on stdout.

use std::io::Write;

use anyhow::{Result, bail};

use uigen_core::{GenerationOutcome, Session};

use crate::render;

/// What to print besides the generated code.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    pub show_plan: bool,
    pub show_explanation: bool,
}

/// Generate once from an empty base and print the result.
///
/// A failed generation is an error (non-zero exit).
pub async fn run_generate<W: Write>(
    session: &Session,
    prompt: &str,
    options: GenerateOptions,
    out: &mut W,
) -> Result<()> {
    if prompt.trim().is_empty() {
        bail!("prompt is empty");
    }

    match session.generate_from_prompt(prompt).await? {
        GenerationOutcome::Committed(snap) => {
            if options.show_plan {
                if let Some(plan) = &snap.plan {
                    write!(out, "{}", render::plan_outline(plan))?;
                    writeln!(out)?;
                }
            }
            writeln!(out, "{}", snap.code)?;
            if options.show_explanation {
                writeln!(out)?;
                writeln!(out, "{}", snap.explanation)?;
            }
            Ok(())
        }
        GenerationOutcome::Failed(failure) => Err(anyhow::Error::new(failure)),
        GenerationOutcome::Skipped => bail!("prompt is empty"),
    }
}
