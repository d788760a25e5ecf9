//! Image metadata extraction.
//!
//! Turns raw file bytes into an [`ImageInfo`] (width, height, bits per pixel)
//! by decoding nothing more than the image header. Extraction never fails
//! loudly: anything that isn't a readable image simply has no metadata.

pub mod error;
mod format;
mod inspect;
pub mod models;

use tracing::instrument;

pub use crate::format::{format_from_path, is_image_path};
pub use crate::inspect::Inspector;
pub use crate::models::ImageInfo;

/// Easy, top-level entrypoint for the extraction of [`ImageInfo`] from raw bytes.
///
/// Returns `None` for malformed, truncated or unrecognized input instead of an
/// error. Use [`Inspector::info`] directly if you care about the reason.
///
/// # Examples
///
/// ```rust
/// assert_eq!(imgdex_extract::extract(b"definitely not an image"), None);
/// ```
#[instrument(level = "debug", skip(bytes), fields(size = bytes.as_ref().len()))]
pub fn extract(bytes: impl AsRef<[u8]>) -> Option<ImageInfo> {
    match Inspector::new(bytes.as_ref()).info() {
        Ok(info) => Some(info),
        Err(err) => {
            tracing::debug!(reason = %*err, "no image metadata");
            None
        },
    }
}
