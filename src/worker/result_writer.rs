//! Atomic result slot writer.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::models::feedback::SessionResult;
use crate::{AppError, Result};

/// Write `result` to `slot` in the result-file format.
///
/// The content goes to a temporary file in the slot's directory which is
/// then renamed over the slot, so a reader never observes a partial file.
///
/// # Errors
///
/// Returns `AppError::Io` if the temporary file cannot be created, written
/// or renamed, and `AppError::ResultParse` if serialization fails.
pub fn write_result(slot: &Path, result: &SessionResult) -> Result<()> {
    let encoded = result.to_slot_json()?;
    let parent = match slot.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|err| AppError::Io(format!("failed to create temporary result file: {err}")))?;
    tmp.write_all(encoded.as_bytes())
        .map_err(|err| AppError::Io(format!("failed to write temporary result file: {err}")))?;
    tmp.persist(slot).map_err(|err| {
        AppError::Io(format!(
            "failed to persist result to {}: {err}",
            slot.display()
        ))
    })?;

    info!(slot = %slot.display(), bytes = encoded.len(), "result written");
    Ok(())
}
