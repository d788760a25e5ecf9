//! In-memory file system for testing.

use crate::backend::PathStream;
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use crate::{FileSystem, Fingerprint, IdentityTable};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory file system for testing.
///
/// Every write advances a logical clock that doubles as the modification
/// stamp, so rewriting a file always changes its fingerprint even when the
/// size stays the same. Reads are counted, which lets tests prove that a code
/// path never looked at file content.
///
/// # Examples
///
/// ```
/// use imgdex_vfs::{FileSystem, backend::MockFileSystem};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fs = MockFileSystem::with_files([("album/cat.png", b"not really a png")]);
/// assert!(fs.exists(Path::new("album/cat.png")).await?);
/// assert_eq!(fs.reads(), 0);
/// fs.read(Path::new("album/cat.png")).await?;
/// assert_eq!(fs.reads(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockFileSystem {
    name: String,
    local: bool,
    files: RwLock<HashMap<PathBuf, MockFile>>,
    identities: IdentityTable,
    clock: AtomicI64,
    reads: AtomicUsize,
}
struct MockFile {
    modified: i64,
    data: Vec<u8>,
}

impl Default for MockFileSystem {
    fn default() -> Self {
        Self::with_files(Vec::<(PathBuf, Vec<u8>)>::new())
    }
}
impl MockFileSystem {
    /// Create a mock file system pre-populated with files.
    ///
    /// Panics if any path fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let mut clock = 0;
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockFileSystem::with_files: invalid path {}", path.display());
            };
            clock += 1;
            map.insert(validated, MockFile { modified: clock, data: data.into() });
        }
        Self {
            name: "mock".to_string(),
            local: true,
            files: RwLock::new(map),
            identities: IdentityTable::new(),
            clock: AtomicI64::new(clock),
            reads: AtomicUsize::new(0),
        }
    }

    /// Pretend to be a virtual (non-local) file system, such as the inside
    /// of an archive.
    pub fn into_virtual(mut self) -> Self {
        self.local = false;
        self
    }

    /// Number of times file content has been read.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of distinct paths an identity has been resolved for.
    pub async fn resolved(&self) -> usize {
        self.identities.len().await
    }

    /// Create or overwrite a file, advancing its modification stamp.
    pub async fn write(&self, path: impl AsRef<Path>, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = validate_path(path)?;
        let modified = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.files.write().await.insert(path, MockFile { modified, data: data.into() });
        Ok(())
    }

    /// Advance a file's modification stamp without changing its content.
    pub async fn touch(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = validate_path(path)?;
        let modified = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        match self.files.write().await.get_mut(&path) {
            Some(file) => file.modified = modified,
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
        Ok(())
    }

    pub async fn delete(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = validate_path(path)?;
        match self.files.write().await.remove(&path) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    /// Pin a path to a raw host identity, sign bit included.
    pub async fn assign_id(&self, path: impl AsRef<Path>, raw: i32) -> Result<()> {
        self.identities.assign(validate_path(path)?, raw).await;
        Ok(())
    }
}

#[async_trait]
impl FileSystem for MockFileSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_local(&self) -> bool {
        self.local
    }

    async fn resolve_id(&self, path: &Path) -> Result<i32> {
        self.identities.resolve(&validate_path(path)?).await
    }

    async fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let path = validate_path(path)?;
        let files = self.files.read().await;
        match files.get(&path) {
            Some(file) => Ok(Fingerprint::new(&path, file.modified, file.data.len() as u64)),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.files.read().await.get(&path) {
            Some(file) => Ok(file.data.clone()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.read().await.contains_key(&validate_path(path)?))
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> PathStream<'a> {
        Box::pin(stream! {
            let prefix = match prefix.map(validate_path).transpose() {
                Ok(prefix) => prefix,
                Err(e) => { yield Err(e); return; },
            };
            let files = self.files.read().await;
            for path in files.keys() {
                if prefix.as_ref().is_none_or(|pfx| path.starts_with(pfx)) {
                    yield Ok(path.clone());
                }
            }
        })
    }
}
