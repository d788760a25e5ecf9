//! Index Error Types
//!
//! The store keeps these to itself as far as it can: the facade turns every
//! one of them into "no value". They surface only through the lower-level
//! [`IndexStore`](crate::IndexStore) API.

use derive_more::{Display, Error};

/// An index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Key bytes were too short to hold a file identity.
    #[display("malformed key")]
    MalformedKey,
    /// Value bytes were too short to hold a record.
    #[display("malformed record")]
    MalformedRecord,
    /// The host file system couldn't resolve or describe a file.
    #[display("file system error")]
    FileSystem,
    #[display("persistence error")]
    Persistence,
    /// The indexer panicked or its task was cancelled.
    #[display("extraction failed")]
    Extraction,
    #[display("index store is closed")]
    Closed,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FileSystem | Self::Persistence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Persistence.is_retryable());
        assert!(ErrorKind::FileSystem.is_retryable());
        assert!(!ErrorKind::MalformedRecord.is_retryable());
        assert!(!ErrorKind::Closed.is_retryable());
    }
}
