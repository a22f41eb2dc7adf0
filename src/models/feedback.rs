//! Feedback payload, session result, and the result-slot wire format.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::{AppError, Result};

/// User feedback collected by the worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FeedbackPayload {
    /// Free-text feedback; may be empty.
    #[serde(default)]
    pub text_feedback: String,
    /// Image paths in selection order, without duplicates.
    #[serde(default)]
    pub images: Vec<PathBuf>,
}

impl FeedbackPayload {
    /// Build a payload, dropping repeated image paths (first occurrence wins).
    #[must_use]
    pub fn new(text_feedback: String, images: Vec<PathBuf>) -> Self {
        let mut unique: Vec<PathBuf> = Vec::with_capacity(images.len());
        for image in images {
            if !unique.contains(&image) {
                unique.push(image);
            }
        }
        Self {
            text_feedback,
            images: unique,
        }
    }

    /// Whether the payload carries neither text nor images.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text_feedback.trim().is_empty() && self.images.is_empty()
    }
}

/// JSON object the worker writes to the result slot.
///
/// `interactive_feedback` holds a nested JSON-encoded [`FeedbackPayload`];
/// an empty string means the user closed the worker without submitting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ResultFile {
    /// Concatenated command output.
    #[serde(default)]
    pub command_logs: String,
    /// Nested JSON-encoded feedback payload.
    #[serde(default)]
    pub interactive_feedback: String,
}

/// Scratch directory owned by one session.
///
/// Holds the result slot and any images the worker captured for the
/// session. Removed on drop; removal failures are logged.
#[derive(Debug)]
pub struct SessionScratch {
    dir: Option<TempDir>,
}

impl SessionScratch {
    /// Take ownership of a freshly created scratch directory.
    #[must_use]
    pub fn new(dir: TempDir) -> Self {
        Self { dir: Some(dir) }
    }

    /// Path of the scratch directory.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        self.dir.as_ref().map(TempDir::path)
    }
}

impl Drop for SessionScratch {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = %path.display(), "session scratch removed"),
                Err(err) => {
                    warn!(path = %path.display(), %err, "failed to remove session scratch");
                }
            }
        }
    }
}

/// Outcome of one feedback session.
#[derive(Debug, Default)]
pub struct SessionResult {
    /// Concatenation of all streamed command output, in insertion order.
    pub command_logs: String,
    /// Feedback the user submitted (empty when cancelled).
    pub feedback: FeedbackPayload,
    scratch: Option<SessionScratch>,
}

impl SessionResult {
    /// Build a result with no attached scratch directory.
    #[must_use]
    pub fn new(command_logs: String, feedback: FeedbackPayload) -> Self {
        Self {
            command_logs,
            feedback,
            scratch: None,
        }
    }

    /// A cancelled session: the captured logs and an empty payload.
    #[must_use]
    pub fn cancelled(command_logs: String) -> Self {
        Self::new(command_logs, FeedbackPayload::default())
    }

    /// Attach the session scratch directory so it lives as long as the result.
    #[must_use]
    pub fn with_scratch(mut self, scratch: SessionScratch) -> Self {
        self.scratch = Some(scratch);
        self
    }

    /// Parse the contents of a result slot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResultParse` if the outer object or the nested
    /// feedback payload is not valid JSON of the expected shape.
    pub fn from_slot_json(raw: &str) -> Result<Self> {
        let file: ResultFile = serde_json::from_str(raw)
            .map_err(|err| AppError::ResultParse(format!("invalid result file: {err}")))?;

        let feedback = if file.interactive_feedback.trim().is_empty() {
            FeedbackPayload::default()
        } else {
            let nested: FeedbackPayload = serde_json::from_str(&file.interactive_feedback)
                .map_err(|err| {
                    AppError::ResultParse(format!("invalid interactive_feedback payload: {err}"))
                })?;
            FeedbackPayload::new(nested.text_feedback, nested.images)
        };

        Ok(Self::new(file.command_logs, feedback))
    }

    /// Encode the result in the result-slot wire format.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ResultParse` if serialization fails.
    pub fn to_slot_json(&self) -> Result<String> {
        let file = ResultFile {
            command_logs: self.command_logs.clone(),
            interactive_feedback: serde_json::to_string_pretty(&self.feedback)?,
        };
        Ok(serde_json::to_string(&file)?)
    }
}
