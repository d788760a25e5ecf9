use crate::error::{Error, ErrorKind, Result};
use crate::store::IndexStore;
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt, TryStreamExt, future};
use imgdex_vfs::FsHandle;
use std::path::{Path, PathBuf};

pub enum ScanEvent<V> {
    Started,
    /// An eligible file was brought up to date. `value` is `None` if the
    /// indexer found nothing in it.
    Indexed { path: PathBuf, value: Option<V> },
    Failed { path: PathBuf, error: Error },
    Complete { files: u64, indexed: u64 },
}

/// Bring every eligible file under `prefix` up to date, `concurrency` files
/// at a time.
///
/// Files are visited in no particular order. Ineligible files are skipped
/// without being resolved. A failure on one file is reported as
/// [`ScanEvent::Failed`] and doesn't stop the scan; a failure to list files
/// is yielded as an error.
pub fn scan<'a, V>(
    store: &'a IndexStore<V>,
    fs: &'a FsHandle,
    prefix: Option<&'a Path>,
    concurrency: usize,
) -> impl Stream<Item = Result<ScanEvent<V>>> + 'a
where
    V: Clone + Send + Sync + 'static,
{
    stream! {
        yield Ok(ScanEvent::Started);
        let updates = fs
            .list_stream(prefix)
            .map(|listed| listed.or_raise(|| ErrorKind::FileSystem))
            .try_filter(|path| future::ready(store.extension().accepts(fs.as_ref(), path)))
            .map_ok(|path| async move {
                let result = store.update(fs, &path).await;
                Ok::<_, Error>((path, result))
            })
            .try_buffer_unordered(concurrency.max(1));
        let mut updates = std::pin::pin!(updates);
        let (mut files, mut indexed) = (0, 0);
        while let Some(update) = updates.next().await {
            match update {
                Ok((path, Ok(value))) => {
                    files += 1;
                    indexed += u64::from(value.is_some());
                    yield Ok(ScanEvent::Indexed { path, value });
                },
                Ok((path, Err(error))) => {
                    files += 1;
                    tracing::warn!(index = store.name(), path = %path.display(), %error, "Unable to index file");
                    yield Ok(ScanEvent::Failed { path, error });
                },
                Err(e) => {
                    yield Err(e);
                },
            }
        }
        tracing::info!(index = store.name(), files, indexed, "Scan complete");
        yield Ok(ScanEvent::Complete { files, indexed });
    }
}
