//! Derived-metadata indexes over a file corpus.
//!
//! An index maps each eligible file to at most one small record computed from
//! its content, keeps that record on disk between runs, and recomputes it only
//! when the file changes. [`ImageInfoIndex`] is the one this crate ships:
//! image dimensions and bit depth.
//!
//! # Architecture
//! - [`Extension`] describes an index as plain data: a name, a schema version,
//!   and functions for filtering, extraction, and encoding.
//! - [`IndexStore`] runs any extension against a
//!   [`Persistence`](imgdex_cache::Persistence) and a
//!   [`FileSystem`](imgdex_vfs::FileSystem).
//! - [`scan`] indexes a whole directory tree.

pub mod codec;
pub mod error;
mod extension;
mod image_info;
mod scan;
mod store;

pub use crate::extension::{Extension, Indexer, InputFilter};
pub use crate::image_info::{IMAGE_INFO_INDEX, ImageInfoIndex};
pub use crate::scan::{ScanEvent, scan};
pub use crate::store::{EntryState, IndexStore, Stats};
