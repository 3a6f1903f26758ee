mod config;
mod generate_cmd;
mod render;
mod session_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use uigen_core::{DefaultTemplates, GenerationPipeline, Session};

use config::{CliOverrides, UigenConfig};
use generate_cmd::GenerateOptions;

#[derive(Parser)]
#[command(name = "uigen", about = "Generate UI code from natural language, with branching history")]
struct Cli {
    /// Model command, program first (overrides UIGEN_MODEL_COMMAND)
    #[arg(long, global = true)]
    model_command: Option<String>,

    /// Per-stage timeout in seconds, 0 to disable (overrides UIGEN_STAGE_TIMEOUT_SECS)
    #[arg(long, global = true)]
    stage_timeout: Option<u64>,

    /// What to show after a failed generation: placeholder or retain
    /// (overrides UIGEN_ON_FAILURE)
    #[arg(long, global = true)]
    on_failure: Option<String>,

    /// Config file path (defaults to ~/.config/uigen/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate once and print the code
    Generate {
        /// Description of the UI
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Also print the validated plan outline
        #[arg(long)]
        plan: bool,
        /// Also print the model's explanation
        #[arg(long)]
        explain: bool,
    },
    /// Start an interactive session with rollback and branching
    Session,
}

/// Execute the `uigen init` command: write config file.
fn cmd_init(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile::default();
    config::save_config(path, &cfg)?;

    println!("Config written to {}", path.display());
    println!("  model.command = {}", cfg.model.command);
    println!("  model.args = {:?}", cfg.model.args);
    println!("  session.stage_timeout_secs = {}", cfg.session.stage_timeout_secs);
    println!("  session.on_failure = {}", cfg.session.on_failure);
    Ok(())
}

fn build_session(resolved: UigenConfig) -> Session {
    tracing::debug!(model = %resolved.model.command_line(), "using model command");
    let pipeline = GenerationPipeline::new(Arc::new(resolved.model), Arc::new(DefaultTemplates));
    Session::new(pipeline, resolved.session)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let overrides = CliOverrides {
        model_command: cli.model_command.clone(),
        stage_timeout_secs: cli.stage_timeout,
        on_failure: cli.on_failure.clone(),
    };

    match cli.command {
        Commands::Init { force } => {
            cmd_init(&config_path, force)?;
        }
        Commands::Generate {
            prompt,
            plan,
            explain,
        } => {
            let session = build_session(UigenConfig::resolve(&overrides, &config_path)?);
            let options = GenerateOptions {
                show_plan: plan,
                show_explanation: explain,
            };
            let mut stdout = std::io::stdout().lock();
            generate_cmd::run_generate(&session, &prompt.join(" "), options, &mut stdout).await?;
        }
        Commands::Session => {
            let session = build_session(UigenConfig::resolve(&overrides, &config_path)?);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            let interrupts = session_cmd::forward_interrupts();
            session_cmd::run_session_loop(&session, stdin, &mut stdout, Some(interrupts)).await?;
        }
    }

    Ok(())
}
