//! File system trait and implementations.
//!
//! This module defines the [`FileSystem`] trait: the narrow slice of a host
//! file system that the index depends on. Implementations exist for the local
//! disk and (behind the `mock` feature) for an in-memory corpus used in tests.

mod local;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::local::LocalFileSystem;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockFileSystem;
use crate::error::Result;
use crate::{FileId, Fingerprint};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub(crate) type PathStream<'a> = Pin<Box<dyn Stream<Item = Result<PathBuf>> + Send + 'a>>;

/// What the index needs from the host's file system.
///
/// # Path Handling
/// All paths are relative to the file system's root and are normalized with
/// [`validate_path`](crate::validate_path) by implementations before use.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use imgdex_vfs::{FileSystem, error::Result};
///
/// async fn describe(fs: &dyn FileSystem, path: &Path) -> Result<String> {
///     let id = fs.file_id(path).await?;
///     let fingerprint = fs.fingerprint(path).await?;
///     Ok(format!("#{id} ({} bytes)", fingerprint.size))
/// }
/// ```
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Name of the file system, used for logging only.
    fn name(&self) -> &str;

    /// Whether files live on real local storage.
    ///
    /// Virtual, synthetic, or memory-only file systems return `false`. Must be
    /// cheap: it is asked about every candidate file.
    fn is_local(&self) -> bool;

    /// Raw host identity of the file at `path`.
    ///
    /// The sign bit belongs to the host; use [`file_id`](Self::file_id) unless
    /// you really want the raw value.
    async fn resolve_id(&self, path: &Path) -> Result<i32>;

    /// Normalized identity of the file at `path`, safe to use as a key.
    async fn file_id(&self, path: &Path) -> Result<FileId> {
        Ok(FileId::from_raw(self.resolve_id(path).await?))
    }

    /// Current content fingerprint of the file at `path`.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn fingerprint(&self, path: &Path) -> Result<Fingerprint>;

    /// Read the complete contents of the file at `path`.
    ///
    /// Only called when (re)extraction is actually needed.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Stream the paths of every file under an optional prefix.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> PathStream<'a>;

    /// Collect [`list_stream()`](Self::list_stream) into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<PathBuf>> {
        self.list_stream(prefix).try_collect().await
    }
}
