//! # Filesystem access
//!
//! Everything in this crate reaches the filesystem through [`FileSystem`], so
//! callers can substitute their own view of it (a rooted or instrumented
//! filesystem, for example). [`OsFs`] is the plain host filesystem.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub trait FileSystem: fmt::Debug + Send + Sync {
    /// Returns `true` if something exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns the absolute, normalized form of an existing `path`, with all
    /// symlinks resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Opens `path` with the given options.
    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<File>;
}

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl OsFs {
    pub fn shared() -> Arc<dyn FileSystem> {
        Arc::new(OsFs)
    }
}

impl FileSystem for OsFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<File> {
        options.open(path)
    }
}

/// Address of the filesystem instance, used as its identity.
pub(crate) fn fs_identity(fs: &Arc<dyn FileSystem>) -> usize {
    Arc::as_ptr(fs) as *const () as usize
}
