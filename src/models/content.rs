//! Typed content blocks returned to the MCP caller.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Local};
use rmcp::model::Content;

/// Timestamp format used when rendering text blocks.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One unit of the tool response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// Text feedback (or the "no feedback" notice) with its capture time.
    Text {
        /// Rendered feedback text.
        body: String,
        /// Time the block was packaged.
        timestamp: DateTime<Local>,
    },
    /// Raw image bytes.
    Image {
        /// File contents.
        bytes: Vec<u8>,
        /// MIME type inferred from the file extension.
        mime_type: &'static str,
    },
    /// A single image that could not be read.
    Error {
        /// Message naming the file and the failure.
        message: String,
    },
}

impl ContentBlock {
    /// Convert into MCP protocol content.
    #[must_use]
    pub fn into_content(self) -> Content {
        match self {
            Self::Text { body, timestamp } => Content::text(format!(
                "{body}\nSubmitted at: {}",
                timestamp.format(TIMESTAMP_FORMAT)
            )),
            Self::Image { bytes, mime_type } => Content::image(STANDARD.encode(bytes), mime_type),
            Self::Error { message } => Content::text(message),
        }
    }

    /// Short label for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Error { .. } => "error",
        }
    }
}
