use crate::codec::{KeyCodec, ValueCodec};
use imgdex_vfs::FileSystem;
use std::path::Path;

/// Decides from cheap facts alone whether a file belongs in an index.
///
/// Must never read file content.
pub type InputFilter = fn(&dyn FileSystem, &Path) -> bool;

/// Derives a value from file content; `None` means "nothing to index".
///
/// Must be pure and must not panic on arbitrary input.
pub type Indexer<V> = fn(&[u8]) -> Option<V>;

/// Everything the [`IndexStore`](crate::IndexStore) needs to know about one
/// kind of index.
///
/// Bumping `version` discards every persisted entry of the index the next
/// time it is opened, so it must change whenever the indexer or the value
/// codec would produce different bytes for the same file.
pub struct Extension<V> {
    /// Stable name, used as the persistence namespace.
    pub name: &'static str,
    pub version: u32,
    /// Number of decoded values to keep in memory.
    pub cache_size: u64,
    pub input_filter: InputFilter,
    pub indexer: Indexer<V>,
    pub key_codec: KeyCodec,
    pub value_codec: ValueCodec<V>,
}
impl<V> Extension<V> {
    pub fn accepts(&self, fs: &dyn FileSystem, path: &Path) -> bool {
        (self.input_filter)(fs, path)
    }
}
impl<V> Clone for Extension<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for Extension<V> {}
impl<V> std::fmt::Debug for Extension<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("cache_size", &self.cache_size)
            .finish_non_exhaustive()
    }
}
