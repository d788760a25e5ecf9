//! Header inspection for the raster formats the `image` crate can read.

use crate::error::{ErrorKind, Result};
use crate::models::ImageInfo;
use exn::{OptionExt, ResultExt};
use image::{ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::instrument;

/// Reads image metadata straight out of a byte buffer.
///
/// Only the header is decoded: the pixel data is never touched, so the bytes
/// don't need to describe a complete image, just its leading metadata.
#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    bytes: &'a [u8],
}
impl<'a> Inspector<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Detect the image format from the leading magic bytes.
    pub fn format(&self) -> Option<ImageFormat> {
        image::guess_format(self.bytes).ok()
    }

    /// Decode the header and collect width, height and bit depth.
    ///
    /// # Errors
    ///
    /// - [`UnrecognizedFormat`](ErrorKind::UnrecognizedFormat) if the magic
    ///   bytes don't match any known format,
    /// - [`MalformedHeader`](ErrorKind::MalformedHeader) if the decoder
    ///   couldn't make sense of the header,
    /// - [`DimensionOverflow`](ErrorKind::DimensionOverflow) if either side is
    ///   larger than `i32::MAX`.
    #[instrument(level = "trace", skip(self), fields(size = self.bytes.len()))]
    pub fn info(&self) -> Result<ImageInfo> {
        let format = self.format().ok_or_raise(|| ErrorKind::UnrecognizedFormat)?;
        let decoder = ImageReader::with_format(Cursor::new(self.bytes), format)
            .into_decoder()
            .or_raise(|| ErrorKind::MalformedHeader)?;
        let (width, height) = decoder.dimensions();
        // The original colour type is what's in the file; `color_type()` is
        // what the decoder would expand it to (palette -> RGB, etc.).
        let bpp = decoder.original_color_type().bits_per_pixel();
        Ok(ImageInfo {
            width: dimension(width)?,
            height: dimension(height)?,
            bpp: i32::from(bpp),
        })
    }
}

fn dimension(value: u32) -> Result<i32> {
    i32::try_from(value).or_raise(|| ErrorKind::DimensionOverflow(value))
}
