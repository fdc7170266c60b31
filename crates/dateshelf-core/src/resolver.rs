//! Date-coded destination resolution

use std::path::{Path, PathBuf};

/// Shortest file name that carries a date prefix
pub const MIN_NAME_LEN: usize = 14;

/// Leading characters that must be ASCII digits
const DATE_PREFIX_LEN: usize = 10;

/// Map a file name to its destination directory under `root`
///
/// Names need at least 14 characters, the first 10 of them ASCII digits.
/// The result is `<root>/<chars 0..2>/<chars 0..6>-<chars 6..10>`.
///
/// # Examples
///
/// ```
/// use dateshelf_core::resolve_destination;
/// use std::path::Path;
///
/// let dir = resolve_destination(Path::new("/archive"), Some("2023061512_abcde.pdf"));
/// assert_eq!(dir.unwrap(), Path::new("/archive/20/202306-1512"));
///
/// assert!(resolve_destination(Path::new("/archive"), Some("short.pdf")).is_none());
/// assert!(resolve_destination(Path::new("/archive"), None).is_none());
/// ```
pub fn resolve_destination(root: &Path, file_name: Option<&str>) -> Option<PathBuf> {
    let name = file_name?;
    if name.chars().count() < MIN_NAME_LEN {
        return None;
    }

    let prefix: String = name.chars().take(DATE_PREFIX_LEN).collect();
    if prefix.len() != DATE_PREFIX_LEN || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(
        root.join(&prefix[..2])
            .join(format!("{}-{}", &prefix[..6], &prefix[6..])),
    )
}
