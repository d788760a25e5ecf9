//! One function per subcommand.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use imgdex_index::{ImageInfoIndex, ScanEvent, scan as scan_tree};
use imgdex_vfs::FsHandle;
use imgdex_vfs::backend::LocalFileSystem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Index every image under `directory`, printing each one found.
pub async fn scan(index: &ImageInfoIndex, directory: &Path, concurrency: usize) -> Result<()> {
    let root = tokio::fs::canonicalize(directory).await.or_raise(|| ErrorKind::FileSystem)?;
    let fs: FsHandle = Arc::new(LocalFileSystem::new("scan", &root).or_raise(|| ErrorKind::FileSystem)?);
    let mut events = std::pin::pin!(scan_tree(index.store(), &fs, None, concurrency));
    while let Some(event) = events.next().await {
        match event.or_raise(|| ErrorKind::Index)? {
            ScanEvent::Indexed { path, value: Some(info) } => println!("{}: {info}", path.display()),
            ScanEvent::Failed { path, error } => eprintln!("{}: {error}", path.display()),
            ScanEvent::Complete { files, indexed } => eprintln!("{indexed} of {files} image files indexed"),
            ScanEvent::Started | ScanEvent::Indexed { value: None, .. } => {},
        }
    }
    Ok(())
}

/// Every file is looked up through one file system rooted at the top of the
/// tree. Returns the files as paths relative to that root.
fn filesystem_for(files: &[PathBuf]) -> Result<(FsHandle, Vec<PathBuf>)> {
    let absolute = files
        .iter()
        .map(|file| std::path::absolute(file).or_raise(|| ErrorKind::FileSystem))
        .collect::<Result<Vec<_>>>()?;
    let root = absolute
        .first()
        .and_then(|file| file.ancestors().last())
        .ok_or_raise(|| ErrorKind::FileSystem)?
        .to_path_buf();
    let fs = LocalFileSystem::new("local", &root).or_raise(|| ErrorKind::FileSystem)?;
    let relative = absolute
        .iter()
        .map(|file| fs.relativize(file).or_raise(|| ErrorKind::FileSystem))
        .collect::<Result<Vec<_>>>()?;
    Ok((Arc::new(fs), relative))
}

/// Print `path: WxH @ Nbpp` for each file, or `path: -` if it has no metadata.
pub async fn get(index: &ImageInfoIndex, files: &[PathBuf]) -> Result<()> {
    let (fs, paths) = filesystem_for(files)?;
    for (file, path) in files.iter().zip(&paths) {
        match index.get(&fs, path).await {
            Some(info) => println!("{}: {info}", file.display()),
            None => println!("{}: -", file.display()),
        }
    }
    Ok(())
}

pub async fn forget(index: &ImageInfoIndex, files: &[PathBuf]) -> Result<()> {
    let (fs, paths) = filesystem_for(files)?;
    for path in &paths {
        let removed = index.store().invalidate(&fs, path).await.or_raise(|| ErrorKind::Index)?;
        tracing::info!(path = %path.display(), removed, "Forgotten");
    }
    Ok(())
}

pub async fn stats(index: &ImageInfoIndex) -> Result<()> {
    let store = index.store();
    let entries = store.entries().await.or_raise(|| ErrorKind::Index)?;
    println!("{} (schema version {}): {entries} entries", store.name(), store.version());
    Ok(())
}
