//! The persistence boundary.

use crate::StoredEntry;
use crate::error::Result;
use async_trait::async_trait;

/// Durable storage for any number of named, versioned indexes.
///
/// Keys and values are opaque bytes produced by each index's codecs. Each
/// `(index, key)` pair maps to at most one [`StoredEntry`]; writing an entry
/// replaces the previous one atomically.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Name of the store, used for logging only.
    fn name(&self) -> &str;

    /// Schema version the index was last written with, if it was ever written.
    async fn version(&self, index: &str) -> Result<Option<u32>>;

    /// Drop every entry of `index` and stamp it with `version`.
    ///
    /// Both happen in one transaction: a crash in the middle never leaves old
    /// entries behind a new version stamp.
    async fn reset(&self, index: &str, version: u32) -> Result<()>;

    async fn get(&self, index: &str, key: &[u8]) -> Result<Option<StoredEntry>>;

    /// Insert or replace the entry for `key`.
    ///
    /// The index must have been stamped by [`reset`](Self::reset) first.
    async fn put(&self, index: &str, key: &[u8], entry: &StoredEntry) -> Result<()>;

    /// Remove the entry for `key`, returning `true` if there was one.
    async fn remove(&self, index: &str, key: &[u8]) -> Result<bool>;

    /// Number of entries (including extraction misses) in `index`.
    async fn count(&self, index: &str) -> Result<u64>;

    /// Flush and release resources. The store must not be used afterwards.
    async fn close(&self);
}
