//! Human-readable image metadata for the `get_image_info` tool.

use std::path::Path;

use image::{ColorType, ImageDecoder, ImageFormat, ImageReader};

use crate::{AppError, Result};

/// Describe the image at `path`.
///
/// Returns one `key: value` line each for the file name, format, pixel
/// dimensions, color mode and file size. A missing file yields
/// `File not found: <path>`; any other failure yields
/// `Failed to read image info: <err>`. Decoding stops at the header, so large
/// images are cheap to describe.
#[must_use]
pub fn image_info(path: &Path) -> String {
    if !path.exists() {
        return format!("File not found: {}", path.display());
    }

    match describe(path) {
        Ok(info) => info,
        Err(err) => format!("Failed to read image info: {err}"),
    }
}

fn describe(path: &Path) -> Result<String> {
    let reader = ImageReader::open(path)?
        .with_guessed_format()
        .map_err(|err| AppError::ImageRead(err.to_string()))?;
    let format = reader.format();
    let decoder = reader
        .into_decoder()
        .map_err(|err| AppError::ImageRead(err.to_string()))?;
    let (width, height) = decoder.dimensions();
    let mode = color_mode(decoder.color_type());

    let size = std::fs::metadata(path)?.len();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    #[allow(clippy::cast_precision_loss)] // File sizes far below 2^52 bytes.
    let kilobytes = size as f64 / 1024.0;

    Ok(format!(
        "File name: {name}\nFormat: {}\nDimensions: {width} x {height}\nMode: {mode}\nFile size: {kilobytes:.1} KB",
        format.map_or("unknown", format_name),
    ))
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Gif => "GIF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Tiff => "TIFF",
        ImageFormat::Ico => "ICO",
        _ => "unknown",
    }
}

/// Channel layout in the conventional short notation (`L`, `RGB`, ...).
fn color_mode(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGB;F",
        ColorType::Rgba32F => "RGBA;F",
        _ => "unknown",
    }
}
