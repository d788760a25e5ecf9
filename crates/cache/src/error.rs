//! Errors raised by persistence backends.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong while reading or writing persisted index entries.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// The store refused the operation (closed, read-only, or failing).
    #[display("store unavailable")]
    Unavailable,
    /// A persisted column could not be converted back into its model.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Lock contention and outages clear up on their own; bad schema or bad
    /// rows do not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database | Self::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Database.is_retryable());
        assert!(ErrorKind::Unavailable.is_retryable());
        assert!(!ErrorKind::Migration.is_retryable());
        assert!(!ErrorKind::InvalidData("size").is_retryable());
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidData("origin").to_string(), "invalid cache data: origin");
    }
}
