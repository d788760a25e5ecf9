//! Byte codecs for index keys and values.
//!
//! Everything persisted is big-endian with no framing: a key is exactly one
//! `u32`, and a value is whatever sequence of fixed-width fields its codec
//! writes. Decoders only ever complain about missing bytes; trailing bytes are
//! ignored.

use crate::error::{ErrorKind, Result};
use exn::OptionExt;
use imgdex_vfs::FileId;

/// Converts file identities to and from persisted key bytes.
#[derive(Debug, Clone, Copy)]
pub struct KeyCodec {
    pub encode: fn(FileId) -> Vec<u8>,
    pub decode: fn(&[u8]) -> Result<FileId>,
}
impl KeyCodec {
    /// Identity as a 4-byte big-endian integer.
    ///
    /// ```rust
    /// use imgdex_index::codec::KeyCodec;
    /// use imgdex_vfs::FileId;
    ///
    /// let bytes = (KeyCodec::FILE_ID.encode)(FileId::from_raw(-5));
    /// assert_eq!(bytes, [0, 0, 0, 5]);
    /// assert_eq!((KeyCodec::FILE_ID.decode)(&bytes).unwrap(), FileId::new(5));
    /// ```
    pub const FILE_ID: Self = Self {
        encode: encode_file_id,
        decode: decode_file_id,
    };
}

fn encode_file_id(id: FileId) -> Vec<u8> {
    id.get().to_be_bytes().to_vec()
}

fn decode_file_id(bytes: &[u8]) -> Result<FileId> {
    let id = FieldReader::new(bytes).u32().ok_or_raise(|| ErrorKind::MalformedKey)?;
    Ok(FileId::new(id))
}

/// Converts index values to and from persisted bytes.
pub struct ValueCodec<V> {
    pub encode: fn(&V) -> Vec<u8>,
    pub decode: fn(&[u8]) -> Result<V>,
}
// Derives would demand `V: Clone`, which function pointers don't need.
impl<V> Clone for ValueCodec<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for ValueCodec<V> {}
impl<V> std::fmt::Debug for ValueCodec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueCodec").finish_non_exhaustive()
    }
}

/// Sequential reader over big-endian fields.
///
/// Every accessor returns `None` once the input runs out, leaving the reader
/// where it was.
#[derive(Debug)]
pub struct FieldReader<'a> {
    bytes: &'a [u8],
}
impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, rest) = self.bytes.split_first_chunk::<N>()?;
        self.bytes = rest;
        Some(*head)
    }

    pub fn u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_be_bytes)
    }

    pub fn i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_be_bytes)
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }
}
