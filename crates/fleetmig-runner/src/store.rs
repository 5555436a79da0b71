//! Target storage
//!
//! [`TargetStore`] is the runner's only I/O seam. [`FsStore`] replaces files
//! atomically: the new text goes to a temporary file in the same directory,
//! is synced, takes the original's permissions and is renamed over it. A
//! failure at any step leaves the original untouched and the temporary file
//! is removed on drop.

use crate::error::WriteError;
use crate::hash::ContentHash;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Read and replace worker files
pub trait TargetStore {
    /// Read a file as UTF-8 text
    ///
    /// # Errors
    /// Returns the underlying IO error
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Replace `path` with `contents`, provided it still hashes to `expected`
    ///
    /// # Errors
    /// Returns error if the file changed since it was read or could not be
    /// replaced; the original is left as it was
    fn replace(&self, path: &Path, expected: ContentHash, contents: &str)
        -> Result<(), WriteError>;
}

/// Local filesystem store
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl TargetStore for FsStore {
    fn read(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn replace(
        &self,
        path: &Path,
        expected: ContentHash,
        contents: &str,
    ) -> Result<(), WriteError> {
        atomic_replace(path, Some(expected), contents)
    }
}

/// Atomically write `contents` to `path`
///
/// With `expected`, the write is refused if the current file does not hash
/// to it. The check runs right before the rename.
///
/// # Errors
/// Returns `WriteError` on any IO failure or a concurrent modification
pub fn atomic_replace(
    path: &Path,
    expected: Option<ContentHash>,
    contents: &str,
) -> Result<(), WriteError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let permissions = match fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(WriteError::io(path, e)),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| WriteError::io(path, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| WriteError::io(tmp.path(), e))?;
    if let Some(permissions) = permissions {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| WriteError::io(tmp.path(), e))?;
    }

    if let Some(expected) = expected {
        let on_disk = fs::read(path).map_err(|e| WriteError::io(path, e))?;
        let actual = ContentHash::compute(&on_disk);
        if actual != expected {
            return Err(WriteError::Modified {
                path: path.to_path_buf(),
                expected,
                actual,
            });
        }
    }

    tmp.persist(path).map_err(|e| WriteError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    sync_dir(dir).ok();

    debug!(path = %path.display(), bytes = contents.len(), "file replaced");
    Ok(())
}

fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir).and_then(|d| d.sync_all())
}
