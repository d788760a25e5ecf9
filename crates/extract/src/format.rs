//! File type detection from paths.
//!
//! This is the cheap check performed on every candidate file, so it looks at
//! the file name only and never opens the file.

use image::ImageFormat;
use std::path::Path;

/// Detect the image format from a file extension.
///
/// Formats that the enabled decoders can't read are reported as `None`; a
/// file we could never extract anything from is not an image as far as the
/// index is concerned.
#[must_use]
pub fn format_from_path(path: impl AsRef<Path>) -> Option<ImageFormat> {
    ImageFormat::from_path(path).ok().filter(|format| format.reading_enabled())
}

/// Returns `true` if the file name says this is an image we can inspect.
///
/// # Examples
///
/// ```rust
/// use imgdex_extract::is_image_path;
///
/// assert!(is_image_path("holiday/beach.PNG"));
/// assert!(is_image_path("scan.jpeg"));
/// assert!(!is_image_path("notes.txt"));
/// assert!(!is_image_path("png"));
/// ```
#[must_use]
pub fn is_image_path(path: impl AsRef<Path>) -> bool {
    format_from_path(path).is_some()
}
