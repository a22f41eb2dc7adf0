//! Feedback being composed in a worker session.
//!
//! Images come from two places: paths the user attaches directly, and
//! captured copies (the clipboard stand-in) that the session owns. Captured
//! copies live in the capture directory until the draft is submitted or
//! discarded. On submit the copies still attached are handed over with the
//! result; everything else is deleted.

use std::path::{Path, PathBuf};

use tempfile::{TempDir, TempPath};
use tracing::{debug, warn};

use crate::models::feedback::FeedbackPayload;
use crate::{AppError, Result};

/// Session-owned copies of captured images.
#[derive(Debug)]
pub struct TempImages {
    dir: PathBuf,
    private_dir: Option<TempDir>,
    files: Vec<TempPath>,
}

impl TempImages {
    /// Capture into `dir`, normally the session scratch directory that the
    /// server removes after packaging.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            private_dir: None,
            files: Vec::new(),
        }
    }

    /// Capture into a private temporary directory removed with `self`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created.
    pub fn private() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("interactive-feedback-captures-")
            .tempdir()?;
        Ok(Self {
            dir: dir.path().to_path_buf(),
            private_dir: Some(dir),
            files: Vec::new(),
        })
    }

    /// Directory captured copies are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths of the captured copies still owned.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|file| file.to_path_buf()).collect()
    }

    /// Copy `source` into a new session-owned file and return its path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ImageRead` if `source` cannot be copied.
    pub fn capture(&mut self, source: &Path) -> Result<PathBuf> {
        let suffix = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or_else(|| ".png".to_owned(), |ext| format!(".{ext}"));

        let file = tempfile::Builder::new()
            .prefix("capture-")
            .suffix(&suffix)
            .tempfile_in(&self.dir)
            .map_err(|err| AppError::Io(format!("failed to create capture file: {err}")))?;
        let path = file.into_temp_path();

        std::fs::copy(source, &path).map_err(|err| {
            AppError::ImageRead(format!("failed to copy {}: {err}", source.display()))
        })?;

        debug!(source = %source.display(), copy = %path.display(), "image captured");
        let owned = path.to_path_buf();
        self.files.push(path);
        Ok(owned)
    }

    /// Delete the captured copy at `path`, if this owns one.
    pub fn discard(&mut self, path: &Path) {
        if let Some(index) = self.files.iter().position(|file| &**file == path) {
            close(self.files.remove(index));
        }
    }

    /// Keep the captured copies in `keep` on disk and delete the rest.
    ///
    /// Kept files are no longer owned; whoever owns the capture directory
    /// removes them.
    pub fn release(&mut self, keep: &[PathBuf]) {
        for file in std::mem::take(&mut self.files) {
            if keep.iter().any(|kept| kept.as_path() == &*file) {
                if let Err(err) = file.keep() {
                    warn!(%err, "failed to keep captured image");
                }
            } else {
                close(file);
            }
        }
    }

    /// Delete every captured copy.
    pub fn clear(&mut self) {
        for file in std::mem::take(&mut self.files) {
            close(file);
        }
    }
}

impl Drop for TempImages {
    fn drop(&mut self) {
        self.clear();
        if let Some(dir) = self.private_dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                warn!(path = %path.display(), %err, "failed to remove capture directory");
            }
        }
    }
}

fn close(file: TempPath) {
    let path = file.to_path_buf();
    match file.close() {
        Ok(()) => debug!(path = %path.display(), "captured image removed"),
        Err(err) => warn!(path = %path.display(), %err, "failed to remove captured image"),
    }
}

/// Text and images collected so far.
#[derive(Debug)]
pub struct FeedbackDraft {
    text: String,
    images: Vec<PathBuf>,
    captures: TempImages,
}

impl FeedbackDraft {
    /// Empty draft whose captured images go to `captures`.
    #[must_use]
    pub fn new(captures: TempImages) -> Self {
        Self {
            text: String::new(),
            images: Vec::new(),
            captures,
        }
    }

    /// Feedback text so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attached images in selection order.
    #[must_use]
    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    /// Whether neither text nor images were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }

    /// Append one line of feedback text.
    pub fn push_line(&mut self, line: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);
    }

    /// Attach an existing image file. Returns `false` if it was already
    /// attached.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ImageRead` if `path` is not a file.
    pub fn attach(&mut self, path: PathBuf) -> Result<bool> {
        if !path.is_file() {
            return Err(AppError::ImageRead(format!(
                "{} is not a file",
                path.display()
            )));
        }
        if self.images.contains(&path) {
            return Ok(false);
        }
        self.images.push(path);
        Ok(true)
    }

    /// Copy `source` into a session-owned file and attach the copy.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ImageRead` if `source` cannot be copied.
    pub fn capture(&mut self, source: &Path) -> Result<PathBuf> {
        let copy = self.captures.capture(source)?;
        self.images.push(copy.clone());
        Ok(copy)
    }

    /// Detach the image at `index` (zero-based), deleting it if captured.
    pub fn remove(&mut self, index: usize) -> Option<PathBuf> {
        if index >= self.images.len() {
            return None;
        }
        let removed = self.images.remove(index);
        self.captures.discard(&removed);
        Some(removed)
    }

    /// Detach every image and delete captured copies.
    pub fn clear_images(&mut self) {
        self.images.clear();
        self.captures.clear();
    }

    /// Finish the draft. The text is trimmed; captured copies still attached
    /// stay on disk for the receiver of the payload.
    #[must_use]
    pub fn into_payload(mut self) -> FeedbackPayload {
        let images = std::mem::take(&mut self.images);
        self.captures.release(&images);
        FeedbackPayload::new(self.text.trim().to_owned(), images)
    }
}
