//! Persistent storage for derived-metadata indexes.
//!
//! This crate owns the bytes on disk. It knows nothing about images: every
//! index is a named, versioned map from opaque key bytes to an optional
//! opaque value, stamped with the [`Fingerprint`] of the file the value was
//! derived from. Interpreting those bytes is the job of the index's codecs.
//!
//! # Architecture
//! - [`Persistence`] is the boundary the index store talks to.
//! - [`SqliteStore`] implements it on top of a [`Database`] (SQLite, WAL).
//! - `MemoryStore` (feature `mock`) implements it in memory, with switchable
//!   write failures for exercising rollback paths.

mod db;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod memory;
mod models;
mod persistence;
mod sqlite;

pub use crate::db::Database;
#[cfg(any(test, feature = "mock"))]
pub use crate::memory::MemoryStore;
pub use crate::models::StoredEntry;
pub use crate::persistence::Persistence;
pub use crate::sqlite::SqliteStore;
use std::sync::Arc;

pub type PersistenceHandle = Arc<dyn Persistence + Send + Sync>;
