//! Path normalization for file system roots.
//!
//! Every path handed to a [`FileSystem`](crate::FileSystem) is relative to
//! that file system's root. Normalizing up front means the same file always
//! produces the same path, and therefore the same identity.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Normalize a root-relative path, rejecting anything that escapes the root.
///
/// `.` components and repeated or trailing separators disappear, `..` is
/// resolved lexically. Leading `/` is treated as "the root", not as the host
/// file system's root. Null bytes, Windows prefixes and empty results are
/// rejected with [`InvalidPath`](crate::error::ErrorKind::InvalidPath).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use imgdex_vfs::validate_path;
///
/// assert_eq!(validate_path("Holiday//./beach.png").unwrap(), Path::new("Holiday/beach.png"));
/// assert_eq!(validate_path("raw/../jpeg/cat.jpg").unwrap(), Path::new("jpeg/cat.jpg"));
/// assert!(validate_path("../outside.png").is_err());
/// assert!(validate_path("a\0b.png").is_err());
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let invalid = || ErrorKind::InvalidPath(original.to_path_buf());
    let mut normalized = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(segment) if segment.as_encoded_bytes().contains(&0) => exn::bail!(invalid()),
            Component::Normal(segment) => normalized.push(segment),
            Component::CurDir | Component::RootDir => {},
            Component::ParentDir if normalized.pop().is_some() => {},
            Component::ParentDir | Component::Prefix(_) => exn::bail!(invalid()),
        }
    }
    if normalized.is_empty() {
        exn::bail!(invalid());
    }
    Ok(normalized.into_iter().collect())
}

/// Express an absolute path relative to `root`, normalized.
///
/// Fails with [`InvalidPath`](crate::error::ErrorKind::InvalidPath) if the
/// path isn't absolute or lives outside of `root`.
pub(crate) fn relative_to(root: &Path, absolute: &Path) -> Result<PathBuf> {
    if !absolute.is_absolute() {
        exn::bail!(ErrorKind::InvalidPath(absolute.to_path_buf()));
    }
    match absolute.strip_prefix(root) {
        Ok(relative) => validate(relative),
        Err(_) => exn::bail!(ErrorKind::InvalidPath(absolute.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("beach.png", "beach.png")]
    #[case("Holiday/beach.png", "Holiday/beach.png")]
    #[case("a//b///c.gif", "a/b/c.gif")]
    #[case("./a/./b.gif", "a/b.gif")]
    #[case("/rooted/c.bmp", "rooted/c.bmp")]
    #[case("Album/", "Album")]
    #[case("a/b/..", "a")]
    #[case("x/../y/../z.png", "z.png")]
    fn test_normalized(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("//")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/../../b.png")]
    #[case("a\0b.png")]
    fn test_rejected(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/srv/photos");
        assert_eq!(relative_to(root, Path::new("/srv/photos/a/b.png")).unwrap(), Path::new("a/b.png"));
        assert!(relative_to(root, Path::new("/srv/other/b.png")).is_err());
        assert!(relative_to(root, Path::new("a/b.png")).is_err());
        assert!(relative_to(root, root).is_err());
    }
}
