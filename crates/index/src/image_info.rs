//! The image metadata index: width, height and bit depth of every image file
//! on local storage.

use crate::codec::{FieldReader, KeyCodec, ValueCodec};
use crate::error::{ErrorKind, Result};
use crate::extension::Extension;
use crate::store::IndexStore;
use imgdex_cache::PersistenceHandle;
use imgdex_extract::ImageInfo;
use imgdex_vfs::{FileId, FileSystem, FsHandle};
use std::path::Path;

/// Registration of the image metadata index.
pub const IMAGE_INFO_INDEX: Extension<ImageInfo> = Extension {
    name: "ImageFileInfoIndex",
    version: 2,
    cache_size: 1024,
    input_filter: accepts,
    indexer: index,
    key_codec: KeyCodec::FILE_ID,
    value_codec: ValueCodec {
        encode: encode_image_info,
        decode: decode_image_info,
    },
};

/// Only images that actually live on disk; decided from the path alone.
fn accepts(fs: &dyn FileSystem, path: &Path) -> bool {
    fs.is_local() && imgdex_extract::is_image_path(path)
}

fn index(bytes: &[u8]) -> Option<ImageInfo> {
    imgdex_extract::extract(bytes)
}

/// Width, height, bpp: three big-endian `i32`s.
fn encode_image_info(info: &ImageInfo) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(12);
    for field in [info.width, info.height, info.bpp] {
        bytes.extend_from_slice(&field.to_be_bytes());
    }
    bytes
}

fn decode_image_info(bytes: &[u8]) -> Result<ImageInfo> {
    let mut reader = FieldReader::new(bytes);
    let (Some(width), Some(height), Some(bpp)) = (reader.i32(), reader.i32(), reader.i32()) else {
        exn::bail!(ErrorKind::MalformedRecord);
    };
    Ok(ImageInfo::new(width, height, bpp))
}

/// Image metadata for files in a corpus.
///
/// Failures never reach the caller: a file that can't be indexed for any
/// reason simply has no value.
///
/// # Examples
///
/// ```no_run
/// use imgdex_cache::{Database, SqliteStore};
/// use imgdex_index::ImageInfoIndex;
/// use imgdex_vfs::{FsHandle, backend::LocalFileSystem};
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let db = Database::connect("/tmp/imgdex.db").await?;
/// let index = ImageInfoIndex::open(Arc::new(SqliteStore::from(&db)), None).await?;
/// let fs: FsHandle = Arc::new(LocalFileSystem::new("photos", "/home/user/Pictures")?);
/// if let Some(info) = index.get(&fs, Path::new("cat.png")).await {
///     println!("{info}");
/// }
/// index.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ImageInfoIndex {
    store: IndexStore<ImageInfo>,
}

impl ImageInfoIndex {
    pub async fn open(persistence: PersistenceHandle, cache_size: Option<u64>) -> Result<Self> {
        Ok(Self {
            store: IndexStore::open(IMAGE_INFO_INDEX, persistence, cache_size).await?,
        })
    }

    /// Call `consumer` with the metadata of the file at `path`, if it has any.
    ///
    /// Ineligible files are rejected without reading them. Returns `false`
    /// only if the consumer returned `false`.
    pub async fn process_values<F>(&self, fs: &FsHandle, path: &Path, consumer: F) -> bool
    where
        F: FnMut(FileId, &ImageInfo) -> bool,
    {
        self.store.process_values(fs, path, consumer).await
    }

    pub async fn get(&self, fs: &FsHandle, path: &Path) -> Option<ImageInfo> {
        let mut found = None;
        self.process_values(fs, path, |_, info| {
            found = Some(*info);
            false
        })
        .await;
        found
    }

    /// The store behind the facade, for maintenance operations.
    pub fn store(&self) -> &IndexStore<ImageInfo> {
        &self.store
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}
