//! Local disk file system.
//!
//! Files live in a directory on the local disk and are accessed with
//! `tokio::fs`. A file's identity and origin both come from its canonical
//! location, so every instance (and every run) agrees on them no matter which
//! directory it was rooted at.

use crate::backend::PathStream;
use crate::error::{ErrorKind, Result};
use crate::path::{relative_to, validate as validate_path};
use crate::{FileSystem, Fingerprint, IdentityTable};
use async_stream::stream;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(PathBuf),
    Descend(PathBuf),
    Skip,
}

/// Local disk file system rooted at a directory.
///
/// # Examples
///
/// ```no_run
/// use imgdex_vfs::backend::LocalFileSystem;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let fs = LocalFileSystem::new("photos", "/home/me/Pictures")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LocalFileSystem {
    name: String,
    root: PathBuf,
    identities: IdentityTable,
}
impl LocalFileSystem {
    /// Create a local file system rooted at an existing, absolute directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || !root.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self {
            name: name.into(),
            root,
            identities: IdentityTable::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Turn a path given on the command line (absolute, or relative to the
    /// root) into the root-relative form every other method expects.
    pub fn relativize(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        match path.is_absolute() {
            true => relative_to(&self.root, path),
            false => validate_path(path),
        }
    }

    fn absolute_path(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(validate_path(path)?))
    }

    /// Where the file at `path` really lives: symlinks resolved, or the plain
    /// joined path for a file that is already gone.
    async fn location(&self, path: &Path) -> Result<PathBuf> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::canonicalize(&abs_path).await.unwrap_or(abs_path))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn process_entry(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<WalkEntry> {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| Self::map_io_error(e, &path))?;
        let relative = relative_to(&self.root, &path)?;
        if let Some(pfx) = prefix
            && !relative.starts_with(pfx)
            && !pfx.starts_with(&relative)
        {
            return Ok(WalkEntry::Skip);
        }
        if file_type.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if file_type.is_file() && prefix.is_none_or(|pfx| relative.starts_with(pfx)) {
            return Ok(WalkEntry::File(relative));
        }
        // Symlinks and other oddities are not part of the corpus.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn resolve_id(&self, path: &Path) -> Result<i32> {
        self.identities.derive(&self.location(path).await?).await
    }

    async fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        let location = self.location(path).await?;
        Ok(Fingerprint::from_system_time(&location, modified, metadata.len()))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> PathStream<'a> {
        let prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        let mut stack = vec![self.root.clone()];
        Box::pin(stream! {
            while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A directory removed mid-walk is just an empty directory.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue;
                    }
                };
                loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue; },
                    };
                    match self.process_entry(entry, prefix.as_deref()).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }
}
