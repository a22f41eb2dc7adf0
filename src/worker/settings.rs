//! Per-project command settings.
//!
//! Each project remembers the command to run and whether to start it as
//! soon as a session opens. All projects share one TOML file with a table
//! per project, keyed by the directory's base name plus a short hash of the
//! full path so same-named projects do not collide.

use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::{AppError, Result};

/// Saved settings of one project.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProjectSettings {
    /// Command shown (and run) for the project.
    #[serde(default)]
    pub run_command: String,
    /// Start `run_command` when a session opens.
    #[serde(default)]
    pub execute_automatically: bool,
}

/// TOML-backed settings store.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store backed by `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location under the user's config directory,
    /// or `None` when no home directory is known.
    #[must_use]
    pub fn at_default_location() -> Option<Self> {
        default_settings_path().map(Self::new)
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Settings saved for `project`, or defaults when none exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be read and
    /// `AppError::Config` if it is not valid TOML.
    pub fn load(&self, project: &Path) -> Result<ProjectSettings> {
        let mut all = self.read_all()?;
        Ok(all.remove(&project_key(project)).unwrap_or_default())
    }

    /// Save `settings` for `project`, keeping every other project's entry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the existing file is invalid or cannot
    /// be serialized, and `AppError::Io` on write failures.
    pub fn save(&self, project: &Path, settings: &ProjectSettings) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(project_key(project), settings.clone());
        let encoded = toml::to_string_pretty(&all)?;

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|err| {
            AppError::Io(format!(
                "failed to create settings directory {}: {err}",
                parent.display()
            ))
        })?;

        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|err| AppError::Io(format!("failed to create temporary file: {err}")))?;
        tmp.write_all(encoded.as_bytes())
            .map_err(|err| AppError::Io(format!("failed to write temporary file: {err}")))?;
        tmp.persist(&self.path).map_err(|err| {
            AppError::Io(format!(
                "failed to persist settings to {}: {err}",
                self.path.display()
            ))
        })?;

        info!(project = %project.display(), path = %self.path.display(), "project settings saved");
        Ok(())
    }

    fn read_all(&self) -> Result<BTreeMap<String, ProjectSettings>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file yet");
                Ok(BTreeMap::new())
            }
            Err(err) => Err(AppError::Io(format!(
                "failed to read settings {}: {err}",
                self.path.display()
            ))),
        }
    }
}

/// Table key for `project`: `<basename>_<first 8 hex chars of sha256(path)>`.
#[must_use]
pub fn project_key(project: &Path) -> String {
    let full = project.to_string_lossy();
    let base = project
        .file_name()
        .map_or_else(|| "project".to_owned(), |name| name.to_string_lossy().into_owned());

    let mut hasher = Sha256::new();
    hasher.update(full.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!("{base}_{}", &digest[..8])
}

fn default_settings_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("interactive-feedback")
            .join("projects.toml"),
    )
}
