//! The host file system, as far as the index is concerned.
//!
//! The index never touches files directly. Everything it needs to know about
//! a file (who it is, whether it changed, what's in it) goes through the
//! [`FileSystem`] trait defined here.

pub mod backend;
pub mod error;
mod fingerprint;
mod id;
mod path;

pub use crate::backend::FileSystem;
pub use crate::fingerprint::Fingerprint;
pub use crate::id::{FileId, IdentityTable, location_identity};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type FsHandle = Arc<dyn FileSystem + Send + Sync>;
