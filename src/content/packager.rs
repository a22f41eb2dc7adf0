//! Content packager.
//!
//! Turns a [`SessionResult`] into the ordered content blocks returned to the
//! agent: the text block first (when there is text), then one block per
//! image in selection order. Each image is read independently, so a missing
//! or unreadable file becomes an error block in its own position without
//! affecting the others.

use std::path::Path;

use chrono::Local;
use tracing::{debug, warn};

use crate::content::mime::mime_type_for;
use crate::models::content::ContentBlock;
use crate::models::feedback::SessionResult;
use crate::AppError;

/// Body of the block returned when the user provided nothing.
pub const NO_FEEDBACK_TEXT: &str = "No feedback was provided.";

/// Package the feedback of `result` into content blocks.
///
/// Text feedback is rendered as `"{prefix}: {text}"`. Never returns an
/// empty vector.
pub async fn package(result: &SessionResult, prefix: &str) -> Vec<ContentBlock> {
    let feedback = &result.feedback;
    let mut blocks = Vec::with_capacity(feedback.images.len() + 1);

    if !feedback.text_feedback.trim().is_empty() {
        blocks.push(ContentBlock::Text {
            body: format!("{prefix}: {}", feedback.text_feedback),
            timestamp: Local::now(),
        });
    }

    for path in &feedback.images {
        blocks.push(image_block(path).await);
    }

    if blocks.is_empty() {
        blocks.push(ContentBlock::Text {
            body: NO_FEEDBACK_TEXT.into(),
            timestamp: Local::now(),
        });
    }

    debug!(
        blocks = blocks.len(),
        images = feedback.images.len(),
        "feedback packaged"
    );
    blocks
}

async fn image_block(path: &Path) -> ContentBlock {
    match tokio::fs::read(path).await {
        Ok(bytes) => ContentBlock::Image {
            bytes,
            mime_type: mime_type_for(path),
        },
        Err(err) => {
            let err = AppError::ImageRead(format!(
                "failed to read image {}: {err}",
                path.display()
            ));
            warn!(%err, "skipping unreadable feedback image");
            ContentBlock::Error {
                message: err.to_string(),
            }
        }
    }
}
