use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use imgdex_vfs::Fingerprint;

/// A persisted index entry: the fingerprint of the content it was derived
/// from, and the encoded value (if extraction produced one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub fingerprint: Fingerprint,
    /// Encoded value, or `None` if extraction found nothing for this content.
    pub value: Option<Vec<u8>>,
}
impl StoredEntry {
    pub fn new(fingerprint: Fingerprint, value: Option<Vec<u8>>) -> Self {
        Self { fingerprint, value }
    }

    /// Returns `true` if this entry was computed from the given content.
    pub fn is_fresh(&self, current: &Fingerprint) -> bool {
        self.fingerprint == *current
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub(crate) modified: i64,
    pub(crate) size: i64,
    pub(crate) origin: i64,
    #[sqlx(default)]
    pub(crate) value: Option<Vec<u8>>,
}
impl TryFrom<&StoredEntry> for EntryRow {
    type Error = Error;
    fn try_from(entry: &StoredEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            modified: entry.fingerprint.modified,
            size: i64::try_from(entry.fingerprint.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            origin: i64::from(entry.fingerprint.origin),
            value: entry.value.clone(),
        })
    }
}
impl TryFrom<EntryRow> for StoredEntry {
    type Error = Error;
    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            fingerprint: Fingerprint {
                modified: row.modified,
                size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("size"))?,
                origin: u32::try_from(row.origin).or_raise(|| ErrorKind::InvalidData("origin"))?,
            },
            value: row.value,
        })
    }
}
