//! `uigen session`: interactive prompt loop over one in-memory session.
//!
//! Free text is a generation prompt. Lines starting with `:` are commands.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use uigen_core::{GenerationOutcome, Session, Snapshot, SnapshotId};

use crate::render;

const HELP: &str = "\
Type a description of the UI you want, or a command:
  :history            list snapshots in commit order
  :tree               show the snapshot tree
  :rollback <id>      make snapshot <id> the base for the next generation
  :show [id]          print the displayed code (or snapshot <id>'s code)
  :plan               print the displayed plan as an outline
  :explain            print the explanation of the displayed snapshot
  :export <path>      write the full history as JSON
  :reset              discard all history
  :help               show this help
  :quit               exit
";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Prompt(String),
    History,
    Tree,
    Rollback(SnapshotId),
    Show(Option<SnapshotId>),
    Plan,
    Explain,
    Export(PathBuf),
    Reset,
    Help,
    Quit,
    /// Blank line.
    Nothing,
}

/// Parse one line of user input.
pub fn parse_line(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Nothing);
    }
    let Some(command) = line.strip_prefix(':') else {
        return Ok(Input::Prompt(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    let parse_id = |raw: &str| {
        raw.trim_start_matches('#')
            .parse::<SnapshotId>()
            .map_err(|_| format!("invalid snapshot id: {raw:?}"))
    };

    match (name, arg) {
        ("history" | "h", None) => Ok(Input::History),
        ("tree" | "t", None) => Ok(Input::Tree),
        ("rollback" | "r", Some(id)) => parse_id(id).map(Input::Rollback),
        ("rollback" | "r", None) => Err("usage: :rollback <id>".to_string()),
        ("show" | "s", id) => id.map(parse_id).transpose().map(Input::Show),
        ("plan" | "p", None) => Ok(Input::Plan),
        ("explain" | "e", None) => Ok(Input::Explain),
        ("export", Some(_)) => {
            // Paths may contain spaces; take everything after the command.
            let path = command.trim_start()["export".len()..].trim();
            Ok(Input::Export(PathBuf::from(path)))
        }
        ("export", None) => Err("usage: :export <path>".to_string()),
        ("reset", None) => Ok(Input::Reset),
        ("help" | "?", None) => Ok(Input::Help),
        ("quit" | "q" | "exit", None) => Ok(Input::Quit),
        _ => Err(format!("unknown command {line:?} (try :help)")),
    }
}

/// History export document.
#[derive(Debug, Serialize)]
struct HistoryExport<'a> {
    active_snapshot_id: Option<SnapshotId>,
    snapshots: Vec<&'a Snapshot>,
}

/// Write the session history to `path` as pretty JSON.
pub fn export_history(session: &Session, path: &Path) -> Result<usize> {
    let history = session.history();
    let doc = HistoryExport {
        active_snapshot_id: session.active_snapshot_id(),
        snapshots: history.iter().map(|s| s.as_ref()).collect(),
    };
    let json = serde_json::to_string_pretty(&doc).context("failed to serialize history")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write history to {}", path.display()))?;
    Ok(history.len())
}

/// Forward Ctrl-C presses into a channel for [`run_session_loop`].
///
/// Installs one process-wide SIGINT handler. Presses that arrive while the
/// previous one is still unread are dropped.
pub fn forward_interrupts() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if let Err(mpsc::error::TrySendError::Closed(())) = tx.try_send(()) {
                break;
            }
        }
    });
    rx
}

/// Resolves on the next interrupt; never resolves without a live source.
async fn interrupted(interrupts: &mut Option<mpsc::Receiver<()>>) {
    if let Some(rx) = interrupts {
        if rx.recv().await.is_some() {
            return;
        }
    }
    std::future::pending::<()>().await
}

/// Run the interactive loop until `:quit`, end of input, or an interrupt
/// while idle.
///
/// An interrupt during a generation cancels that generation and returns to
/// the prompt.
pub async fn run_session_loop<R, W>(
    session: &Session,
    input: R,
    out: &mut W,
    mut interrupts: Option<mpsc::Receiver<()>>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    writeln!(out, "uigen session {} (:help for commands)", session.id())?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let next = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            () = interrupted(&mut interrupts) => {
                writeln!(out)?;
                break;
            }
        };
        let Some(line) = next else {
            break;
        };

        let parsed = match parse_line(&line) {
            Ok(parsed) => parsed,
            Err(msg) => {
                writeln!(out, "{msg}")?;
                continue;
            }
        };

        match parsed {
            Input::Nothing => {}
            Input::Quit => break,
            Input::Help => write!(out, "{HELP}")?,
            Input::Prompt(prompt) => {
                writeln!(out, "Generating...")?;
                let outcome = generate(session, &prompt, &mut interrupts).await?;
                report_outcome(session, &outcome, out)?;
            }
            Input::History => {
                let view = session.view();
                write!(
                    out,
                    "{}",
                    render::history_list(&view.history, view.active_snapshot_id)
                )?;
            }
            Input::Tree => write!(out, "{}", session.with_store(render::history_tree))?,
            Input::Rollback(id) => match session.rollback_to(id) {
                Ok(snap) => writeln!(out, "Active snapshot is now #{}", snap.id)?,
                Err(e) => writeln!(out, "{e}")?,
            },
            Input::Show(None) => writeln!(out, "{}", session.view().generated_code)?,
            Input::Show(Some(id)) => match session.get(id) {
                Some(snap) => writeln!(out, "{}", snap.code)?,
                None => writeln!(out, "snapshot {id} not found")?,
            },
            Input::Plan => match session.view().plan {
                Some(plan) => write!(out, "{}", render::plan_outline(&plan))?,
                None => writeln!(out, "(no plan)")?,
            },
            Input::Explain => match session.view().explanation {
                Some(text) => writeln!(out, "{text}")?,
                None => writeln!(out, "(no explanation)")?,
            },
            Input::Export(path) => match export_history(session, &path) {
                Ok(n) => writeln!(out, "Exported {n} snapshot(s) to {}", path.display())?,
                Err(e) => writeln!(out, "{e:#}")?,
            },
            Input::Reset => match session.reset() {
                Ok(()) => writeln!(out, "Session reset")?,
                Err(e) => writeln!(out, "{e}")?,
            },
        }
    }

    Ok(())
}

async fn generate(
    session: &Session,
    prompt: &str,
    interrupts: &mut Option<mpsc::Receiver<()>>,
) -> Result<GenerationOutcome> {
    let cancel = CancellationToken::new();
    let generation = session.generate_from_prompt_with_cancel(prompt, &cancel);
    tokio::pin!(generation);

    let result = loop {
        tokio::select! {
            result = &mut generation => break result,
            () = interrupted(interrupts), if !cancel.is_cancelled() => cancel.cancel(),
        }
    };
    Ok(result?)
}

fn report_outcome<W: Write>(session: &Session, outcome: &GenerationOutcome, out: &mut W) -> Result<()> {
    match outcome {
        GenerationOutcome::Skipped => {}
        GenerationOutcome::Committed(snap) => {
            match snap.parent_id {
                Some(parent) => writeln!(out, "Snapshot #{} (based on #{parent})", snap.id)?,
                None => writeln!(out, "Snapshot #{}", snap.id)?,
            }
            writeln!(out, "{}", snap.code)?;
        }
        GenerationOutcome::Failed(failure) => {
            writeln!(out, "Generation failed: {failure}")?;
            writeln!(out, "{}", session.view().generated_code)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncWriteExt, BufReader};
    use uigen_core::{SessionConfig, StageFailure};
    use uigen_test_utils::{BOX_WITH_TEXT, ScriptedModel, session_with};

    async fn wait_for(what: &str, cond: impl Fn() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {what}");
    }

    #[test]
    fn parses_prompts_and_commands() {
        assert_eq!(
            parse_line("  a login form "),
            Ok(Input::Prompt("a login form".into()))
        );
        assert_eq!(parse_line(""), Ok(Input::Nothing));
        assert_eq!(parse_line(":rollback 3"), Ok(Input::Rollback(3)));
        assert_eq!(parse_line(":r #2"), Ok(Input::Rollback(2)));
        assert_eq!(parse_line(":show"), Ok(Input::Show(None)));
        assert_eq!(parse_line(":show 4"), Ok(Input::Show(Some(4))));
        assert_eq!(parse_line(":q"), Ok(Input::Quit));
        assert_eq!(
            parse_line(":export /tmp/my history.json"),
            Ok(Input::Export(PathBuf::from("/tmp/my history.json")))
        );
    }

    #[test]
    fn rejects_bad_commands() {
        assert!(parse_line(":rollback").is_err());
        assert!(parse_line(":rollback two").is_err());
        assert!(parse_line(":frobnicate").is_err());
        assert!(parse_line(":history now").is_err());
    }

    #[tokio::test]
    async fn loop_generates_rolls_back_and_forks() {
        let model = ScriptedModel::new()
            .generation(BOX_WITH_TEXT, "CODE_ONE", "first")
            .generation(BOX_WITH_TEXT, "CODE_TWO", "second")
            .generation(BOX_WITH_TEXT, "CODE_THREE", "third");
        let session = session_with(&model, SessionConfig::default());

        let script = "a card\nmake it red\n:rollback 1\nmake it blue\n:tree\n:quit\nignored\n";
        let mut out = Vec::new();
        run_session_loop(&session, script.as_bytes(), &mut out, None)
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Snapshot #1\nCODE_ONE"), "output was:\n{out}");
        assert!(out.contains("Snapshot #2 (based on #1)"));
        assert!(out.contains("Active snapshot is now #1"));
        assert!(out.contains("Snapshot #3 (based on #1)"));
        assert!(out.contains("    #2 make it red"));
        assert!(out.contains(">   #3 make it blue"));
        assert_eq!(model.call_count(), 9, "input after :quit must be ignored");
    }

    #[tokio::test]
    async fn loop_reports_failures_and_unknown_ids() {
        let model = ScriptedModel::new().fail("provider down");
        let session = session_with(&model, SessionConfig::default());

        let script = "a card\n:rollback 9\n:plan\n";
        let mut out = Vec::new();
        run_session_loop(&session, script.as_bytes(), &mut out, None)
            .await
            .unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains("Generation failed: planning stage failed"), "output was:\n{out}");
        assert!(out.contains("// Error generating UI"));
        assert!(out.contains("snapshot 9 not found"));
        assert!(out.contains("(no plan)"));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn export_writes_history_json() {
        let model = ScriptedModel::new()
            .generation(BOX_WITH_TEXT, "one", "")
            .generation(BOX_WITH_TEXT, "two", "");
        let session = session_with(&model, SessionConfig::default());
        session.generate_from_prompt("one").await.unwrap();
        session.generate_from_prompt("two").await.unwrap();
        session.rollback_to(1).unwrap();

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("history.json");
        assert_eq!(export_history(&session, &path).unwrap(), 2);

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["active_snapshot_id"], 1);
        assert_eq!(doc["snapshots"][1]["parent_id"], 1);
        assert_eq!(doc["snapshots"][0]["plan"][0]["kind"], "Box");
        assert_eq!(doc["snapshots"][0]["plan"][0]["children"][0]["kind"], "Text");
    }

    #[tokio::test]
    async fn interrupt_while_idle_ends_the_loop() {
        let model = ScriptedModel::new();
        let session = session_with(&model, SessionConfig::default());
        let (tx, rx) = mpsc::channel(1);
        // Keep the writer alive so input never reaches end of file.
        let (_input, reader) = tokio::io::duplex(64);

        tx.send(()).await.unwrap();
        let mut out = Vec::new();
        tokio::time::timeout(
            Duration::from_secs(5),
            run_session_loop(&session, BufReader::new(reader), &mut out, Some(rx)),
        )
        .await
        .expect("loop should stop on interrupt")
        .unwrap();
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn interrupt_cancels_generation_then_ends_idle_loop() {
        let model = ScriptedModel::new().held_reply(BOX_WITH_TEXT);
        let session = session_with(&model, SessionConfig::default());
        let (tx, rx) = mpsc::channel(1);
        let (mut input, reader) = tokio::io::duplex(64);
        input.write_all(b"a card\n").await.unwrap();

        let mut out = Vec::new();
        let driver = async {
            wait_for("planning call", || model.call_count() == 1).await;
            tx.send(()).await.unwrap();
            wait_for("generation to stop", || !session.is_busy()).await;

            // The second press lands at the idle prompt.
            tx.send(()).await.unwrap();
        };
        let session_loop = run_session_loop(&session, BufReader::new(reader), &mut out, Some(rx));
        let (result, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(session_loop, driver)
        })
        .await
        .expect("loop should stop on the second interrupt");
        result.unwrap();

        let out = String::from_utf8(out).unwrap();
        let expected = format!(
            "Generation failed: planning stage failed: {}",
            StageFailure::Cancelled
        );
        assert!(out.contains(&expected), "output was:\n{out}");
        assert!(session.history().is_empty());
        assert_eq!(model.call_count(), 1);
        drop(input);
    }
}
