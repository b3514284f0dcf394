use crate::error::{PathMutexError, Result};
use crate::fs::FileSystem;
use std::path::{Path, PathBuf};

/// Name of the lock file used when a directory is locked.
pub const DIRECTORY_LOCK: &str = ".lock";

/// Resolve the identity a lock on `path` is keyed by.
///
/// Existing directories resolve to their [`DIRECTORY_LOCK`] file, since
/// advisory locks are taken on open files. Everything else resolves like
/// [`canonical_path`].
pub fn lock_identity(fs: &dyn FileSystem, path: &Path) -> Result<PathBuf> {
    if fs.is_dir(path) {
        return Ok(canonicalize(fs, path)?.join(DIRECTORY_LOCK));
    }
    canonical_path(fs, path)
}

/// Canonical form of `path`, which need not exist yet.
///
/// A missing path resolves through its parent, so the identity stays the same
/// before and after the file is created as long as the parent is unchanged.
pub fn canonical_path(fs: &dyn FileSystem, path: &Path) -> Result<PathBuf> {
    if fs.exists(path) {
        return canonicalize(fs, path);
    }

    let name = path
        .file_name()
        .ok_or_else(|| PathMutexError::NoFileName(path.to_path_buf()))?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    Ok(canonicalize(fs, parent)?.join(name))
}

fn canonicalize(fs: &dyn FileSystem, path: &Path) -> Result<PathBuf> {
    fs.canonicalize(path).map_err(|e| PathMutexError::Resolve {
        path: path.to_path_buf(),
        source: e,
    })
}
