//! Configuration file management for uigen.
//!
//! Provides a TOML-based config file at `~/.config/uigen/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use uigen_core::session::DEFAULT_ERROR_PLACEHOLDER;
use uigen_core::{CommandModel, FailureDisplay, SessionConfig};

/// Env var overriding the model command (whitespace separated, program first).
pub const ENV_MODEL_COMMAND: &str = "UIGEN_MODEL_COMMAND";
/// Env var overriding the per-stage timeout in seconds (0 disables it).
pub const ENV_STAGE_TIMEOUT: &str = "UIGEN_STAGE_TIMEOUT_SECS";
/// Env var overriding the failure display policy.
pub const ENV_ON_FAILURE: &str = "UIGEN_ON_FAILURE";

/// Default per-stage timeout.
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 120;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub model: ModelSection,
    #[serde(default)]
    pub session: SessionSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    /// Program to run for each model call.
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    /// Per-stage timeout in seconds; 0 disables it.
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,
    /// `placeholder` or `retain`.
    #[serde(default = "default_on_failure")]
    pub on_failure: String,
}

fn default_stage_timeout_secs() -> u64 {
    DEFAULT_STAGE_TIMEOUT_SECS
}

fn default_on_failure() -> String {
    FailureDisplay::default().to_string()
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout_secs(),
            on_failure: default_on_failure(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let model = CommandModel::default();
        Self {
            model: ModelSection {
                command: model.program().to_string(),
                args: model.args().to_vec(),
            },
            session: SessionSection::default(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the uigen config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/uigen` or `~/.config/uigen`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("uigen");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("uigen")
}

/// Return the path to the uigen config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse a config file. Returns an error if it does not exist.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write a config file, creating parent dirs as needed.
pub fn save_config(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub model_command: Option<String>,
    pub stage_timeout_secs: Option<u64>,
    pub on_failure: Option<String>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct UigenConfig {
    pub model: CommandModel,
    pub session: SessionConfig,
}

impl UigenConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// A missing config file is not an error; an unreadable or malformed one is.
    pub fn resolve(cli: &CliOverrides, path: &Path) -> Result<Self> {
        let file = if path.exists() {
            load_config(path)?
        } else {
            ConfigFile::default()
        };

        // Model command.
        let model = if let Some(cmd) = cli.model_command.clone() {
            parse_command_line(&cmd)?
        } else if let Ok(cmd) = std::env::var(ENV_MODEL_COMMAND) {
            parse_command_line(&cmd).with_context(|| format!("invalid {ENV_MODEL_COMMAND}"))?
        } else {
            CommandModel::new(file.model.command.clone(), file.model.args.clone())
        };

        // Stage timeout.
        let timeout_secs = if let Some(secs) = cli.stage_timeout_secs {
            secs
        } else if let Ok(raw) = std::env::var(ENV_STAGE_TIMEOUT) {
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("{ENV_STAGE_TIMEOUT} is not a number: {raw:?}"))?
        } else {
            file.session.stage_timeout_secs
        };

        // Failure display.
        let on_failure = cli
            .on_failure
            .clone()
            .or_else(|| std::env::var(ENV_ON_FAILURE).ok())
            .unwrap_or_else(|| file.session.on_failure.clone());
        let failure_display = on_failure
            .parse::<FailureDisplay>()
            .map_err(|e| anyhow!(e))?;

        Ok(Self {
            model,
            session: SessionConfig {
                stage_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                failure_display,
                error_placeholder: DEFAULT_ERROR_PLACEHOLDER.to_string(),
            },
        })
    }
}

/// Split `"program arg arg"` into a [`CommandModel`].
fn parse_command_line(raw: &str) -> Result<CommandModel> {
    let mut parts = raw.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow!("model command is empty"))?;
    Ok(CommandModel::new(program, parts.map(str::to_string).collect()))
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
