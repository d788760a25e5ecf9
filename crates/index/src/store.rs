//! The index store: persisted entries, an in-memory cache in front of them,
//! and the bookkeeping that keeps concurrent extractions honest.

use crate::error::{ErrorKind, Result};
use crate::extension::Extension;
use derive_more::Display;
use exn::ResultExt;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use imgdex_cache::{PersistenceHandle, StoredEntry};
use imgdex_vfs::error::ErrorKind as VfsErrorKind;
use imgdex_vfs::{FileId, Fingerprint, FsHandle};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tracing::instrument;

/// What a flight hands to everybody waiting on it. Must be `Clone`, so the
/// error is reduced to its kind.
type Outcome<V> = std::result::Result<Option<V>, ErrorKind>;
type Flight<V> = Shared<BoxFuture<'static, Outcome<V>>>;

/// Where a key stands, as far as the store can tell.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Never indexed, removed, or wiped by a schema change.
    Absent,
    /// An extraction is running right now.
    Pending,
    /// Persisted, and computed from the file's current content.
    Fresh,
    /// Persisted, but the file has changed since.
    Stale,
}

/// Counters since the store was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Lookups answered from memory.
    pub hits: u64,
    /// Lookups answered from persistence.
    pub loads: u64,
    /// Times the indexer ran.
    pub extractions: u64,
    /// Extractions that produced nothing.
    pub misses: u64,
    /// Extractions thrown away because the file changed or was invalidated.
    pub discarded: u64,
    /// Results lost to a failed persistence write.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    loads: AtomicU64,
    extractions: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
    failures: AtomicU64,
}
impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Stats {
        Stats {
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            extractions: self.extractions.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone)]
struct Cached<V> {
    fingerprint: Fingerprint,
    value: Option<V>,
}

struct InFlight<V> {
    serial: u64,
    fingerprint: Fingerprint,
    /// Zero until the key is invalidated while this flight runs.
    generation: Arc<AtomicU64>,
    future: Flight<V>,
}

enum Joined<V> {
    /// A flight for the current content of the key.
    Current(Flight<V>),
    /// A flight computing something nobody wants any more. It has to land
    /// before another one may start for the same key.
    Superseded(Flight<V>),
}

/// Persistent, cached, single-flight store for one [`Extension`].
///
/// # Lookups
/// A lookup costs one identity resolution and one fingerprint query against
/// the host file system. If the in-memory cache holds a value for the same
/// fingerprint, that's it. Otherwise the lookup joins (or starts) the one
/// flight allowed per key, which tries persistence and only then reads the
/// file and runs the indexer.
///
/// # Consistency
/// - Memory is written only after persistence accepted the entry.
/// - Before committing, a flight checks that the key wasn't invalidated and
///   that the file's fingerprint hasn't moved. Otherwise it throws its result
///   away.
/// - [`reset`](Self::reset) waits for every running flight before wiping.
///
/// Cloning is cheap and yields a handle to the same store.
pub struct IndexStore<V> {
    inner: Arc<Inner<V>>,
}
impl<V> Clone for IndexStore<V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

struct Inner<V> {
    extension: Extension<V>,
    persistence: PersistenceHandle,
    cache: Cache<FileId, Cached<V>>,
    flights: Mutex<HashMap<FileId, InFlight<V>>>,
    serial: AtomicU64,
    gate: RwLock<()>,
    closed: AtomicBool,
    counters: Counters,
}

impl<V> IndexStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Open the index, wiping its persisted entries if they were written
    /// under a different schema version.
    ///
    /// `cache_size` overrides the extension's own hint.
    #[instrument(skip_all, fields(index = extension.name))]
    pub async fn open(extension: Extension<V>, persistence: PersistenceHandle, cache_size: Option<u64>) -> Result<Self> {
        let stored = persistence.version(extension.name).await.or_raise(|| ErrorKind::Persistence)?;
        if stored != Some(extension.version) {
            match stored {
                Some(stored) => {
                    tracing::info!(stored, current = extension.version, "Index schema changed; discarding entries")
                },
                None => tracing::debug!(version = extension.version, "Creating index"),
            }
            persistence
                .reset(extension.name, extension.version)
                .await
                .or_raise(|| ErrorKind::Persistence)?;
        }
        let cache = Cache::builder()
            .max_capacity(cache_size.unwrap_or(extension.cache_size).max(1))
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Ok(Self {
            inner: Arc::new(Inner {
                extension,
                persistence,
                cache,
                flights: Mutex::new(HashMap::new()),
                serial: AtomicU64::new(0),
                gate: RwLock::new(()),
                closed: AtomicBool::new(false),
                counters: Counters::default(),
            }),
        })
    }

    pub fn name(&self) -> &'static str {
        self.inner.extension.name
    }

    pub fn version(&self) -> u32 {
        self.inner.extension.version
    }

    pub fn extension(&self) -> &Extension<V> {
        &self.inner.extension
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Closed);
        }
        Ok(())
    }

    /// Value for the file at `path`, if it is eligible and has one.
    pub async fn get(&self, fs: &FsHandle, path: &Path) -> Result<Option<V>> {
        Ok(self.lookup(fs, path).await?.map(|(_, value)| value))
    }

    /// Like [`get`](Self::get), but also returns the file's identity.
    ///
    /// An ineligible file is rejected before anything about it is resolved.
    /// A file that no longer exists loses its entry.
    #[instrument(level = "trace", skip(self, fs, path), fields(path = %path.display()))]
    pub async fn lookup(&self, fs: &FsHandle, path: &Path) -> Result<Option<(FileId, V)>> {
        self.ensure_open()?;
        if !self.inner.extension.accepts(fs.as_ref(), path) {
            return Ok(None);
        }
        let id = fs.file_id(path).await.or_raise(|| ErrorKind::FileSystem)?;
        let fingerprint = match fs.fingerprint(path).await {
            Ok(fingerprint) => fingerprint,
            Err(e) if matches!(*e, VfsErrorKind::NotFound(_)) => {
                self.remove(id).await?;
                return Ok(None);
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::FileSystem),
        };
        if let Some(cached) = self.inner.cache.get(&id)
            && cached.fingerprint == fingerprint
        {
            Counters::bump(&self.inner.counters.hits);
            return Ok(cached.value.map(|value| (id, value)));
        }
        let value = self.inner.compute(fs, path, id, fingerprint).await?;
        Ok(value.map(|value| (id, value)))
    }

    /// Feed the file's value, if any, to `consumer`.
    ///
    /// Returns `false` only if the consumer asked to stop. Failures are
    /// logged and otherwise look like "no value".
    pub async fn process_values<F>(&self, fs: &FsHandle, path: &Path, mut consumer: F) -> bool
    where
        F: FnMut(FileId, &V) -> bool,
    {
        match self.lookup(fs, path).await {
            Ok(Some((id, value))) => consumer(id, &value),
            Ok(None) => true,
            Err(e) => {
                tracing::debug!(index = self.name(), path = %path.display(), error = %e, "No value for file");
                true
            },
        }
    }

    /// Index the file now, or drop its entry if it is no longer eligible.
    pub async fn update(&self, fs: &FsHandle, path: &Path) -> Result<Option<V>> {
        self.ensure_open()?;
        if !self.inner.extension.accepts(fs.as_ref(), path) {
            let id = fs.file_id(path).await.or_raise(|| ErrorKind::FileSystem)?;
            self.remove(id).await?;
            return Ok(None);
        }
        self.get(fs, path).await
    }

    /// Forget whatever is known about the file at `path`.
    ///
    /// Hosts call this when a file changes or disappears behind the store's
    /// back. A flight already running for the file will not commit.
    pub async fn invalidate(&self, fs: &FsHandle, path: &Path) -> Result<bool> {
        let id = fs.file_id(path).await.or_raise(|| ErrorKind::FileSystem)?;
        self.remove(id).await
    }

    /// Drop the entry for `id`, returning `true` if one was persisted.
    #[instrument(level = "debug", skip(self), fields(index = self.name()))]
    pub async fn remove(&self, id: FileId) -> Result<bool> {
        self.ensure_open()?;
        {
            // A flight writes to memory under the same lock, so once this
            // block is done it can no longer put anything back.
            let flights = self.inner.flights();
            if let Some(flight) = flights.get(&id) {
                flight.generation.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.cache.invalidate(&id);
        }
        let key = (self.inner.extension.key_codec.encode)(id);
        self.inner
            .persistence
            .remove(self.name(), &key)
            .await
            .or_raise(|| ErrorKind::Persistence)
    }

    /// Where the file at `path` stands. Never reads content or extracts.
    pub async fn state(&self, fs: &FsHandle, path: &Path) -> Result<EntryState> {
        self.ensure_open()?;
        let id = fs.file_id(path).await.or_raise(|| ErrorKind::FileSystem)?;
        let pending = self.inner.flights().contains_key(&id);
        if pending {
            return Ok(EntryState::Pending);
        }
        let key = (self.inner.extension.key_codec.encode)(id);
        let entry = self.inner.persistence.get(self.name(), &key).await.or_raise(|| ErrorKind::Persistence)?;
        let Some(entry) = entry else {
            return Ok(EntryState::Absent);
        };
        if let Some(bytes) = entry.value.as_deref()
            && (self.inner.extension.value_codec.decode)(bytes).is_err()
        {
            return Ok(EntryState::Absent);
        }
        Ok(match fs.fingerprint(path).await {
            Ok(current) if entry.is_fresh(&current) => EntryState::Fresh,
            _ => EntryState::Stale,
        })
    }

    pub fn stats(&self) -> Stats {
        self.inner.counters.snapshot()
    }

    /// Number of persisted entries, extraction misses included.
    pub async fn entries(&self) -> Result<u64> {
        self.ensure_open()?;
        self.inner.persistence.count(self.name()).await.or_raise(|| ErrorKind::Persistence)
    }

    /// Wipe every entry, as a schema version change would.
    ///
    /// Waits for running flights to finish first; new ones wait for the wipe.
    #[instrument(skip(self), fields(index = self.name()))]
    pub async fn reset(&self) -> Result<()> {
        self.ensure_open()?;
        let _gate = self.inner.gate.write().await;
        self.inner
            .persistence
            .reset(self.name(), self.version())
            .await
            .or_raise(|| ErrorKind::Persistence)?;
        self.inner.cache.invalidate_all();
        tracing::info!("Index reset");
        Ok(())
    }

    /// Wait for running flights, then release persistence.
    ///
    /// Every later operation fails with [`ErrorKind::Closed`].
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _gate = self.inner.gate.write().await;
        self.inner.cache.invalidate_all();
        self.inner.persistence.close().await;
        tracing::debug!(index = self.name(), "Index closed");
    }
}

impl<V> Inner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn flights(&self) -> MutexGuard<'_, HashMap<FileId, InFlight<V>>> {
        // Nothing panics while holding the lock, but if something ever does
        // the map is still consistent.
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn compute(self: &Arc<Self>, fs: &FsHandle, path: &Path, id: FileId, fingerprint: Fingerprint) -> Result<Option<V>> {
        loop {
            match self.join(fs, path, id, fingerprint) {
                Joined::Current(flight) => return flight.await.map_err(exn::Exn::from),
                Joined::Superseded(flight) => _ = flight.await,
            }
        }
    }

    fn join(self: &Arc<Self>, fs: &FsHandle, path: &Path, id: FileId, fingerprint: Fingerprint) -> Joined<V> {
        let mut flights = self.flights();
        if let Some(flight) = flights.get(&id) {
            let current = flight.fingerprint == fingerprint && flight.generation.load(Ordering::SeqCst) == 0;
            let future = flight.future.clone();
            return if current { Joined::Current(future) } else { Joined::Superseded(future) };
        }
        let serial = self.serial.fetch_add(1, Ordering::Relaxed);
        let generation = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(Arc::clone(self).run(
            Arc::clone(fs),
            path.to_path_buf(),
            id,
            fingerprint,
            Arc::clone(&generation),
            serial,
        ));
        // The flight lives in its own task: it finishes (and cleans up after
        // itself) even if every waiter goes away.
        let future = task
            .map(|joined| joined.unwrap_or(Err(ErrorKind::Extraction)))
            .boxed()
            .shared();
        flights.insert(id, InFlight { serial, fingerprint, generation, future: future.clone() });
        Joined::Current(future)
    }

    async fn run(
        self: Arc<Self>,
        fs: FsHandle,
        path: PathBuf,
        id: FileId,
        fingerprint: Fingerprint,
        generation: Arc<AtomicU64>,
        serial: u64,
    ) -> Outcome<V> {
        let outcome = self.settle(&fs, &path, id, fingerprint, &generation).await;
        {
            let mut flights = self.flights();
            if flights.get(&id).is_some_and(|flight| flight.serial == serial) {
                flights.remove(&id);
            }
        }
        outcome.map_err(|e| {
            tracing::warn!(index = self.extension.name, path = %path.display(), error = %e, "Unable to index file");
            *e
        })
    }

    /// Produce the value for one key and make it durable.
    async fn settle(
        &self,
        fs: &FsHandle,
        path: &Path,
        id: FileId,
        fingerprint: Fingerprint,
        generation: &AtomicU64,
    ) -> Result<Option<V>> {
        let _gate = self.gate.read().await;
        let name = self.extension.name;
        let key = (self.extension.key_codec.encode)(id);
        if let Some(value) = self.load(&key, &fingerprint).await {
            if !self.remember(id, fingerprint, &value, generation) {
                Counters::bump(&self.counters.discarded);
                return Ok(None);
            }
            Counters::bump(&self.counters.loads);
            return Ok(value);
        }

        let bytes = match fs.read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                // Most likely deleted mid-flight. Not worth remembering.
                tracing::debug!(index = name, path = %path.display(), error = %e, "Unable to read file");
                return Ok(None);
            },
        };
        let indexer = self.extension.indexer;
        let value = tokio::task::spawn_blocking(move || indexer(&bytes))
            .await
            .or_raise(|| ErrorKind::Extraction)?;
        Counters::bump(&self.counters.extractions);
        if value.is_none() {
            Counters::bump(&self.counters.misses);
        }

        if !self.is_current(fs, path, &fingerprint, generation).await {
            Counters::bump(&self.counters.discarded);
            tracing::debug!(index = name, path = %path.display(), "File changed during extraction; discarding");
            return Ok(None);
        }
        let entry = StoredEntry::new(fingerprint, value.as_ref().map(self.extension.value_codec.encode));
        if let Err(e) = self.persistence.put(name, &key, &entry).await {
            Counters::bump(&self.counters.failures);
            return Err(e).or_raise(|| ErrorKind::Persistence);
        }
        if !self.remember(id, fingerprint, &value, generation) {
            // Invalidated while the write was in progress: undo it.
            Counters::bump(&self.counters.discarded);
            self.persistence.remove(name, &key).await.or_raise(|| ErrorKind::Persistence)?;
            return Ok(None);
        }
        Ok(value)
    }

    /// Put a settled value in memory, unless the key was invalidated since the
    /// flight started. Returns whether it went in.
    fn remember(&self, id: FileId, fingerprint: Fingerprint, value: &Option<V>, generation: &AtomicU64) -> bool {
        let _flights = self.flights();
        if generation.load(Ordering::SeqCst) != 0 {
            return false;
        }
        self.cache.insert(id, Cached { fingerprint, value: value.clone() });
        true
    }

    /// Persisted value for `key`, if one exists for this exact content.
    ///
    /// Read failures and undecodable bytes both count as "nothing persisted".
    async fn load(&self, key: &[u8], fingerprint: &Fingerprint) -> Option<Option<V>> {
        let name = self.extension.name;
        let entry = match self.persistence.get(name, key).await {
            Ok(Some(entry)) if entry.is_fresh(fingerprint) => entry,
            Ok(_) => return None,
            Err(e) => {
                tracing::warn!(index = name, error = %e, "Unable to read persisted entry; recomputing");
                return None;
            },
        };
        match entry.value.as_deref().map(self.extension.value_codec.decode).transpose() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(index = name, error = %e, "Persisted entry is malformed; recomputing");
                None
            },
        }
    }

    async fn is_current(&self, fs: &FsHandle, path: &Path, fingerprint: &Fingerprint, generation: &AtomicU64) -> bool {
        generation.load(Ordering::SeqCst) == 0 && fs.fingerprint(path).await.is_ok_and(|now| now == *fingerprint)
    }
}
