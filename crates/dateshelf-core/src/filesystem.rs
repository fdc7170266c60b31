//! Filesystem boundary used by the move executor
//!
//! The executor only touches the disk through [`Filesystem`], so tests can
//! inject failures (locked files, vanished sources) that are hard to provoke
//! on a real filesystem.

use std::fs;
use std::io;
use std::path::Path;

/// Filesystem operations needed to move one file
pub trait Filesystem: Send + 'static {
    /// Whether `path` currently is a regular file
    fn is_file(&self, path: &Path) -> bool;

    /// Whether `path` itself is a regular file, without following symlinks
    fn is_regular_file(&self, path: &Path) -> bool;

    /// Create `path` and all missing parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Move `from` to `to` within one filesystem without replacing anything
    ///
    /// Fails with [`io::ErrorKind::AlreadyExists`] when `to` is occupied.
    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Delete a regular file
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Replace the file's own permissions with the defaults of its directory
    fn reset_permissions(&self, path: &Path) -> io::Result<()>;
}

/// [`Filesystem`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_regular_file(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|meta| meta.is_file())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn move_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        // `rename` replaces an existing target; linking refuses to
        fs::hard_link(from, to)?;
        if let Err(e) = fs::remove_file(from) {
            let _ = fs::remove_file(to);
            return Err(e);
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn reset_permissions(&self, path: &Path) -> io::Result<()> {
        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "file has no parent directory")
        })?;
        let permissions = inherited_permissions(parent, path)?;
        fs::set_permissions(path, permissions)
    }
}

#[cfg(unix)]
fn inherited_permissions(dir: &Path, _file: &Path) -> io::Result<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;

    // Files take the directory's read/write bits, never its execute bits
    let mode = fs::metadata(dir)?.permissions().mode();
    Ok(fs::Permissions::from_mode(mode & 0o666))
}

#[cfg(not(unix))]
fn inherited_permissions(_dir: &Path, file: &Path) -> io::Result<fs::Permissions> {
    let mut permissions = fs::metadata(file)?.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    Ok(permissions)
}
