use crate::error::{ErrorKind, Result};
use derive_more::Display;
use exn::OptionExt;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Stable, non-negative identity of a file within the corpus.
///
/// Hosts hand out raw identities as `i32` and are free to use the sign bit
/// for their own bookkeeping, so a raw identity must never be used as a key
/// directly. Always go through [`FileId::from_raw`], which drops the sign:
/// skipping that step would silently split one file across two keys.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(u32);
impl FileId {
    /// Normalize a raw host identity by taking its absolute value.
    ///
    /// ```rust
    /// use imgdex_vfs::FileId;
    /// assert_eq!(FileId::from_raw(5), FileId::from_raw(-5));
    /// assert_eq!(FileId::from_raw(i32::MIN).get(), 1 << 31);
    /// ```
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw.unsigned_abs())
    }

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}
impl From<u32> for FileId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}
impl From<FileId> for u32 {
    fn from(id: FileId) -> Self {
        id.0
    }
}

/// Raw identity of whatever lives at `location`, the same in every process.
///
/// Derived from a BLAKE3 digest of the location, with the sign bit cleared.
/// Distinct locations can share a digest prefix; [`IdentityTable::derive`]
/// keeps them apart within a process, and the fingerprint's `origin` (an
/// unrelated checksum of the location) keeps their persisted entries apart.
///
/// ```rust
/// use imgdex_vfs::location_identity;
/// let id = location_identity("/srv/photos/cat.png");
/// assert_eq!(id, location_identity("/srv/photos/cat.png"));
/// assert!(id >= 0);
/// ```
pub fn location_identity(location: impl AsRef<Path>) -> i32 {
    let digest = blake3::hash(location.as_ref().as_os_str().as_encoded_bytes());
    let [a, b, c, d, ..] = *digest.as_bytes();
    (u32::from_be_bytes([a, b, c, d]) >> 1) as i32
}

/// Hands out raw identities for paths, one per path, never reused.
///
/// Identities come either from a counter ([`resolve`](Self::resolve)), stable
/// only for the lifetime of the table, or from the location itself
/// ([`derive`](Self::derive)), stable across processes as well.
#[derive(Debug)]
pub struct IdentityTable {
    inner: RwLock<Interned>,
}
#[derive(Debug)]
struct Interned {
    ids: HashMap<PathBuf, i32>,
    taken: HashSet<i32>,
    next: i32,
}
impl Interned {
    fn insert(&mut self, path: PathBuf, id: i32) {
        self.taken.insert(id);
        self.ids.insert(path, id);
    }
}
impl Default for IdentityTable {
    fn default() -> Self {
        Self::new()
    }
}
impl IdentityTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Interned {
                ids: HashMap::new(),
                taken: HashSet::new(),
                next: 1,
            }),
        }
    }

    /// Look up the identity for `path`, allocating one on first sight.
    pub async fn resolve(&self, path: &Path) -> Result<i32> {
        if let Some(id) = self.inner.read().await.ids.get(path) {
            return Ok(*id);
        }
        let mut interned = self.inner.write().await;
        // Somebody else may have won the race between the two locks.
        if let Some(id) = interned.ids.get(path) {
            return Ok(*id);
        }
        let id = interned.next;
        interned.next = id.checked_add(1).ok_or_raise(|| ErrorKind::IdentitiesExhausted)?;
        interned.insert(path.to_path_buf(), id);
        Ok(id)
    }

    /// Look up the identity for `location`, deriving it with
    /// [`location_identity`] on first sight.
    ///
    /// If another location already holds the derived identity, the next free
    /// non-negative one is taken instead, so no two locations share one.
    pub async fn derive(&self, location: &Path) -> Result<i32> {
        if let Some(id) = self.inner.read().await.ids.get(location) {
            return Ok(*id);
        }
        let mut interned = self.inner.write().await;
        if let Some(id) = interned.ids.get(location) {
            return Ok(*id);
        }
        if interned.taken.len() > i32::MAX as usize {
            exn::bail!(ErrorKind::IdentitiesExhausted);
        }
        let mut id = location_identity(location);
        while interned.taken.contains(&id) {
            id = id.checked_add(1).unwrap_or(0);
        }
        interned.insert(location.to_path_buf(), id);
        Ok(id)
    }

    /// Pin `path` to a specific raw identity (sign and all).
    ///
    /// Meant for hosts that already have their own numbering scheme, and for
    /// tests that need to control it.
    pub async fn assign(&self, path: impl Into<PathBuf>, raw: i32) {
        self.inner.write().await.insert(path.into(), raw);
    }

    /// Number of paths that have been given an identity.
    pub async fn len(&self) -> usize {
        self.inner.read().await.ids.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(5, 5)]
    #[case(-5, 5)]
    #[case(i32::MAX, 2_147_483_647)]
    #[case(-i32::MAX, 2_147_483_647)]
    #[case(i32::MIN, 2_147_483_648)]
    fn test_from_raw(#[case] raw: i32, #[case] expected: u32) {
        assert_eq!(FileId::from_raw(raw).get(), expected);
    }

    #[test]
    fn test_sign_variants_collapse() {
        assert_eq!(FileId::from_raw(5), FileId::new(5));
        assert_eq!(FileId::from_raw(-5), FileId::new(5));
    }

    #[test]
    fn test_location_identity() {
        let cat = location_identity("/srv/photos/cat.png");
        assert_eq!(cat, location_identity(Path::new("/srv/photos/cat.png")));
        assert_ne!(cat, location_identity("/srv/photos/dog.png"));
        assert!(cat >= 0);
    }

    #[tokio::test]
    async fn test_derived_identity_matches_location() {
        let table = IdentityTable::new();
        let cat = table.derive(Path::new("/srv/photos/cat.png")).await.unwrap();
        assert_eq!(cat, location_identity("/srv/photos/cat.png"));
        assert_eq!(table.derive(Path::new("/srv/photos/cat.png")).await.unwrap(), cat);
        // A second table (another process) agrees.
        assert_eq!(IdentityTable::new().derive(Path::new("/srv/photos/cat.png")).await.unwrap(), cat);
    }

    #[tokio::test]
    async fn test_derived_identity_steps_past_taken() {
        let table = IdentityTable::new();
        let wanted = location_identity("/srv/photos/cat.png");
        table.assign("/srv/photos/impostor.png", wanted).await;
        let cat = table.derive(Path::new("/srv/photos/cat.png")).await.unwrap();
        assert_ne!(cat, wanted);
        assert_eq!(cat, wanted.checked_add(1).unwrap_or(0));
    }

    #[tokio::test]
    async fn test_identity_is_stable() {
        let table = IdentityTable::new();
        let a = table.resolve(Path::new("a.png")).await.unwrap();
        let b = table.resolve(Path::new("b.png")).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(table.resolve(Path::new("a.png")).await.unwrap(), a);
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn test_assigned_identity_wins() {
        let table = IdentityTable::new();
        table.assign("negative.png", -5).await;
        assert_eq!(table.resolve(Path::new("negative.png")).await.unwrap(), -5);
        // Allocation carries on from its own counter.
        assert_eq!(table.resolve(Path::new("next.png")).await.unwrap(), 1);
    }
}
