//! Global configuration parsing, validation, and worker resolution.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// File name of the bundled console worker binary.
pub const CONSOLE_WORKER_NAME: &str = "interactive-feedback-console";

/// Worker (presentation layer) launch settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Worker executable. When omitted, the console worker installed next to
    /// the server binary is used.
    #[serde(default)]
    pub program: Option<PathBuf>,
    /// Extra arguments placed before the session arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Command runner tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Interval between liveness polls of a running command.
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            liveness_interval_ms: default_liveness_interval_ms(),
        }
    }
}

fn default_liveness_interval_ms() -> u64 {
    100
}

/// Text used when packaging feedback for the caller.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FeedbackConfig {
    /// Prefix placed before the user's text feedback.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Summary shown to the user when the agent sends none.
    #[serde(default = "default_summary")]
    pub default_summary: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            default_summary: default_summary(),
        }
    }
}

fn default_prefix() -> String {
    "User feedback".into()
}

fn default_summary() -> String {
    "The assistant has finished its work. Please review and provide feedback.".into()
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Worker launch settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Command runner tuning.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Feedback packaging text.
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Interval between liveness polls of a running command.
    #[must_use]
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.runner.liveness_interval_ms)
    }

    /// Resolve the worker executable.
    ///
    /// Uses the configured program when present, otherwise the console
    /// worker next to the current executable, falling back to a `PATH`
    /// lookup of the bare name.
    #[must_use]
    pub fn worker_program(&self) -> PathBuf {
        if let Some(ref program) = self.worker.program {
            return program.clone();
        }

        let file_name = format!("{CONSOLE_WORKER_NAME}{}", env::consts::EXE_SUFFIX);
        match env::current_exe() {
            Ok(exe) => exe.with_file_name(&file_name),
            Err(err) => {
                warn!(%err, "cannot resolve current executable, using PATH lookup for worker");
                PathBuf::from(file_name)
            }
        }
    }

    /// Hand the configuration file at `path` to the bundled console worker
    /// so it polls commands at the same interval and shows the same default
    /// summary. A custom worker program keeps its own arguments.
    pub fn share_with_console_worker(&mut self, path: &Path) {
        if self.worker.program.is_some() {
            return;
        }
        self.worker
            .args
            .push(format!("--config={}", path.to_string_lossy()));
    }

    fn validate(&self) -> Result<()> {
        if self.runner.liveness_interval_ms == 0 {
            return Err(AppError::Config(
                "runner.liveness_interval_ms must be greater than zero".into(),
            ));
        }

        if self
            .worker
            .program
            .as_ref()
            .is_some_and(|program| program.as_os_str().is_empty())
        {
            return Err(AppError::Config("worker.program must not be empty".into()));
        }

        Ok(())
    }
}
