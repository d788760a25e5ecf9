use derive_more::Display;

/// Dimensions and bit depth of a single image file.
///
/// Two records with identical fields are interchangeable: there is no identity
/// beyond value equality, so deduplicating them is always safe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[display("{width}x{height} @ {bpp}bpp")]
pub struct ImageInfo {
    pub width: i32,
    pub height: i32,
    /// Bits per pixel, as stored in the file (not after expansion to RGBA).
    pub bpp: i32,
}
impl ImageInfo {
    pub const fn new(width: i32, height: i32, bpp: i32) -> Self {
        Self { width, height, bpp }
    }
}
impl From<(i32, i32, i32)> for ImageInfo {
    fn from((width, height, bpp): (i32, i32, i32)) -> Self {
        Self::new(width, height, bpp)
    }
}
