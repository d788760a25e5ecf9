use std::path::Path;
use std::time::SystemTime;
use time::OffsetDateTime;

/// Opaque token describing a file's content at some point in time.
///
/// Two fingerprints compare equal only if the file is (as far as the host can
/// tell) unchanged. The `origin` component ties the token to the file's
/// location, so an identity that ends up pointing at a different file never
/// matches an entry computed for the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Modification stamp in nanoseconds since the Unix epoch.
    pub modified: i64,
    /// File size in bytes.
    pub size: u64,
    /// CRC32 of the file's location within its file system.
    pub origin: u32,
}
impl Fingerprint {
    pub fn new(path: impl AsRef<Path>, modified: i64, size: u64) -> Self {
        Self {
            modified,
            size,
            origin: origin_of(path),
        }
    }

    /// Build a fingerprint from a system modification time.
    ///
    /// Stamps beyond what fits in an `i64` of nanoseconds (year 2262) saturate.
    pub fn from_system_time(path: impl AsRef<Path>, modified: SystemTime, size: u64) -> Self {
        let nanos = OffsetDateTime::from(modified).unix_timestamp_nanos();
        let modified = i64::try_from(nanos).unwrap_or(if nanos < 0 { i64::MIN } else { i64::MAX });
        Self::new(path, modified, size)
    }
}

fn origin_of(path: impl AsRef<Path>) -> u32 {
    crc32fast::hash(path.as_ref().as_os_str().as_encoded_bytes())
}
