//! Session request model and transport lifecycle states.

use std::ffi::{OsStr, OsString};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Color theme requested for the worker's presentation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    /// Light palette (the fallback for unknown values).
    #[default]
    Light,
    /// Dark palette.
    Dark,
}

impl Theme {
    /// Parse a theme name, falling back to [`Theme::Light`] for anything
    /// other than `light` or `dark`.
    #[must_use]
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dark" => Self::Dark,
            _ => Self::Light,
        }
    }

    /// Wire name passed to the worker.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

impl Display for Theme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One feedback request handed to the worker. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionRequest {
    project_directory: PathBuf,
    summary: String,
    theme: Theme,
}

impl SessionRequest {
    /// Build a request from already-resolved fields.
    #[must_use]
    pub fn new(project_directory: PathBuf, summary: String, theme: Theme) -> Self {
        Self {
            project_directory,
            summary,
            theme,
        }
    }

    /// Build a request from raw tool arguments.
    ///
    /// The project directory falls back to the current directory when it is
    /// blank or does not exist, a blank summary is replaced by
    /// `default_summary`, and unknown themes become [`Theme::Light`].
    #[must_use]
    pub fn from_raw(
        project_directory: Option<&str>,
        summary: Option<&str>,
        theme: Option<&str>,
        default_summary: &str,
    ) -> Self {
        let summary = summary
            .filter(|text| !text.trim().is_empty())
            .unwrap_or(default_summary)
            .to_owned();

        Self {
            project_directory: resolve_project_directory(project_directory),
            summary,
            theme: theme.map(Theme::parse_or_default).unwrap_or_default(),
        }
    }

    /// Directory the worker runs commands in.
    #[must_use]
    pub fn project_directory(&self) -> &Path {
        &self.project_directory
    }

    /// Agent's summary of its work.
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Requested presentation theme.
    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Serialize the request into worker command-line arguments.
    ///
    /// Every value is attached with `=` so summaries starting with `-` are
    /// never read as flags.
    #[must_use]
    pub fn worker_args(&self, output_file: &Path) -> Vec<OsString> {
        vec![
            long_flag("project-directory", &self.project_directory),
            long_flag("prompt", &self.summary),
            long_flag("theme", self.theme.as_str()),
            long_flag("output-file", output_file),
        ]
    }
}

fn long_flag(name: &str, value: impl AsRef<OsStr>) -> OsString {
    let mut arg = OsString::from(format!("--{name}="));
    arg.push(value);
    arg
}

/// Resolve a requested project directory, defaulting to the current
/// directory when the value is blank or the path does not exist.
#[must_use]
pub fn resolve_project_directory(requested: Option<&str>) -> PathBuf {
    let fallback = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    match requested.map(str::trim) {
        Some(raw) if !raw.is_empty() && Path::new(raw).is_dir() => PathBuf::from(raw),
        _ => fallback(),
    }
}

/// Lifecycle of one `run_session` attempt.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session in flight.
    #[default]
    Idle,
    /// Result slot allocated, worker being spawned.
    Launching,
    /// Worker running; waiting for exit or timeout.
    AwaitingResult,
    /// Worker wrote a result that was retrieved.
    Completed,
    /// Worker exited without writing a result.
    Cancelled,
    /// Worker exceeded the session timeout and was reaped.
    TimedOut,
    /// Worker could not be started.
    LaunchFailed,
}

impl SessionState {
    /// Whether the attempt has finished.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::TimedOut | Self::LaunchFailed
        )
    }

    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Launching)
                | (Self::Launching, Self::AwaitingResult | Self::LaunchFailed)
                | (
                    Self::AwaitingResult,
                    Self::Completed | Self::Cancelled | Self::TimedOut
                )
        ) || (self.is_terminal() && next == Self::Idle)
    }
}
