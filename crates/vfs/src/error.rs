//! Errors raised while resolving, fingerprinting or reading corpus files.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The file is gone, or was never a regular file.
    #[display("no such file: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("cannot access {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    #[display("file system failure: {_0}")]
    Io(IoError),
    /// Absolute where a relative path was expected, or climbing out of the
    /// root with `..`.
    #[display("rejected path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Every identity this process could hand out has been handed out.
    #[display("file identities exhausted")]
    IdentitiesExhausted,
}
impl From<IoError> for ErrorKind {
    fn from(source: IoError) -> Self {
        Self::Io(source)
    }
}

impl ErrorKind {
    /// Transient failures: the same call may succeed later without the corpus
    /// changing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
