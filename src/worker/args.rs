//! Worker command-line surface.

use std::path::PathBuf;

use clap::Parser;

use crate::models::session::SessionRequest;

/// Arguments every worker accepts.
///
/// Values are parsed leniently: a missing or nonexistent project directory
/// becomes the current directory and an unknown theme becomes `light`, so a
/// malformed request still opens a usable session.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "interactive-feedback-console",
    about = "Terminal worker for interactive feedback sessions",
    version,
    long_about = None
)]
pub struct WorkerArgs {
    /// Directory the project command runs in.
    #[arg(long, allow_hyphen_values = true)]
    pub project_directory: Option<String>,

    /// Summary of the agent's work shown to the user.
    #[arg(long, allow_hyphen_values = true)]
    pub prompt: Option<String>,

    /// Presentation theme (`light` or `dark`).
    #[arg(long, default_value = "light")]
    pub theme: String,

    /// Result slot. Without it the result is printed to stdout.
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Per-project settings file.
    #[arg(long)]
    pub settings_file: Option<PathBuf>,

    /// Server configuration file; supplies the runner tuning and the
    /// default summary.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl WorkerArgs {
    /// Rebuild the session request carried by these arguments.
    #[must_use]
    pub fn session_request(&self, default_summary: &str) -> SessionRequest {
        SessionRequest::from_raw(
            self.project_directory.as_deref(),
            self.prompt.as_deref(),
            Some(&self.theme),
            default_summary,
        )
    }
}
