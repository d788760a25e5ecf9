mod entry;

pub use self::entry::StoredEntry;
pub(crate) use self::entry::EntryRow;
