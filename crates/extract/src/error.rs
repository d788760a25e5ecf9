//! None of these ever leave [`extract()`](crate::extract): they exist so that
//! the reason an image was skipped ends up in the logs.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Why a byte buffer did not yield an [`ImageInfo`](crate::models::ImageInfo).
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The magic bytes don't match any image format we know how to read.
    #[display("unrecognized image format")]
    UnrecognizedFormat,
    /// The format was recognized, but the header is truncated or corrupt.
    #[display("malformed image header")]
    MalformedHeader,
    /// A dimension reported by the header doesn't fit the record layout.
    #[display("dimension out of range: {_0}")]
    DimensionOverflow(#[error(not(source))] u32),
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        // Same bytes in, same answer out.
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::UnrecognizedFormat.to_string(), "unrecognized image format");
        assert_eq!(ErrorKind::DimensionOverflow(u32::MAX).to_string(), "dimension out of range: 4294967295");
        assert!(!ErrorKind::MalformedHeader.is_retryable());
    }
}
