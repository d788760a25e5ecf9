//! In-memory persistence for testing.

use crate::error::{ErrorKind, Result};
use crate::{Persistence, StoredEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory [`Persistence`] for testing.
///
/// Writes can be switched to fail with [`ErrorKind::Unavailable`], which is
/// how tests exercise the paths where a computed value never makes it to
/// storage. Reads can be slowed down to widen race windows. Successful writes
/// are counted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    indexes: RwLock<HashMap<String, Index>>,
    failing: AtomicBool,
    read_delay_ms: AtomicU64,
    writes: AtomicUsize,
}
#[derive(Debug, Default)]
struct Index {
    version: u32,
    entries: HashMap<Vec<u8>, StoredEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write (`put`, `remove`, `reset`) fail, or succeed again.
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every subsequent `get` sleep for `delay` before returning what it
    /// found.
    pub fn delay_reads(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.read_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of entries written successfully.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Overwrite an entry directly, bypassing any index bookkeeping.
    ///
    /// Used to plant corrupt or foreign data in tests.
    pub async fn plant(&self, index: &str, key: &[u8], entry: StoredEntry) {
        let mut indexes = self.indexes.write().await;
        let index = indexes.entry(index.to_string()).or_default();
        index.entries.insert(key.to_vec(), entry);
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl Persistence for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn version(&self, index: &str) -> Result<Option<u32>> {
        Ok(self.indexes.read().await.get(index).map(|i| i.version))
    }

    async fn reset(&self, index: &str, version: u32) -> Result<()> {
        self.check_writable()?;
        let mut indexes = self.indexes.write().await;
        indexes.insert(index.to_string(), Index { version, entries: HashMap::new() });
        Ok(())
    }

    async fn get(&self, index: &str, key: &[u8]) -> Result<Option<StoredEntry>> {
        let entry = {
            let indexes = self.indexes.read().await;
            indexes.get(index).and_then(|i| i.entries.get(key)).cloned()
        };
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        Ok(entry)
    }

    async fn put(&self, index: &str, key: &[u8], entry: &StoredEntry) -> Result<()> {
        self.check_writable()?;
        let mut indexes = self.indexes.write().await;
        let Some(index) = indexes.get_mut(index) else {
            exn::bail!(ErrorKind::Database);
        };
        index.entries.insert(key.to_vec(), entry.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, index: &str, key: &[u8]) -> Result<bool> {
        self.check_writable()?;
        let mut indexes = self.indexes.write().await;
        Ok(indexes.get_mut(index).and_then(|i| i.entries.remove(key)).is_some())
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let indexes = self.indexes.read().await;
        Ok(indexes.get(index).map_or(0, |i| i.entries.len() as u64))
    }

    async fn close(&self) {}
}
