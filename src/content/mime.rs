//! Extension to MIME type lookup for feedback images.

use std::path::Path;

/// MIME type used when the extension is missing or unknown.
pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// Known image extensions, lowercase.
const IMAGE_MIME_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
];

/// Infer the MIME type of an image from its file extension.
///
/// Matching is case-insensitive. Unknown or missing extensions map to
/// [`DEFAULT_IMAGE_MIME`].
#[must_use]
pub fn mime_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return DEFAULT_IMAGE_MIME;
    };
    let ext = ext.to_ascii_lowercase();

    IMAGE_MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map_or(DEFAULT_IMAGE_MIME, |(_, mime)| mime)
}
