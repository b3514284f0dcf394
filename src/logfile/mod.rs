//! Shared append-only log files.
//!
//! Opening the same log file twice through [`LogFileRegistry::log_file_for`]
//! yields two owner tokens over one open file. The file is closed when the
//! last token is closed or dropped, or when the registry is hard-reset with
//! [`LogFileRegistry::close_log_files`].

mod handle;

pub use handle::{LogFileHandle, SharedLogFile};

use crate::error::{PathMutexError, Result};
use crate::fs::{fs_identity, FileSystem};
use crate::lock::canonical_path;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::debug;

/// Canonical path plus the identity of the filesystem it was opened through.
type LogFileKey = (PathBuf, usize);

#[derive(Debug, Clone, Default)]
pub struct LogFileRegistry {
    files: Arc<Mutex<HashMap<LogFileKey, Arc<SharedLogFile>>>>,
}

impl LogFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry. Created on first use and never torn down.
    pub fn global() -> &'static LogFileRegistry {
        static GLOBAL: OnceLock<LogFileRegistry> = OnceLock::new();
        GLOBAL.get_or_init(LogFileRegistry::new)
    }

    /// Open `path` for appending, sharing the file with every other owner of
    /// the same path on the same filesystem.
    ///
    /// If the file cannot be opened the registry is left untouched.
    pub fn log_file_for(&self, path: &Path, fs: &Arc<dyn FileSystem>) -> Result<LogFileHandle> {
        let path = canonical_path(fs.as_ref(), path)?;
        let key = (path, fs_identity(fs));

        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(shared) = files.get(&key) {
            let owners = shared.acquire();
            debug!("Log file shared: {} (owners: {})", key.0.display(), owners);
            return Ok(LogFileHandle::new(Arc::clone(shared), self.clone()));
        }

        let mut opts = OpenOptions::new();
        opts.create(true).append(true);
        let file = fs
            .open(&key.0, &opts)
            .map_err(|e| PathMutexError::LogFileOpenFailed {
                path: key.0.clone(),
                source: e,
            })?;

        debug!("Log file opened: {}", key.0.display());
        let shared = Arc::new(SharedLogFile::new(key.0.clone(), Arc::clone(fs), file));
        files.insert(key, Arc::clone(&shared));
        Ok(LogFileHandle::new(shared, self.clone()))
    }

    /// Look up the open log file for `path` without becoming an owner.
    pub fn get_log_file_for(
        &self,
        path: &Path,
        fs: &Arc<dyn FileSystem>,
    ) -> Option<Arc<SharedLogFile>> {
        let path = canonical_path(fs.as_ref(), path).ok()?;
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.get(&(path, fs_identity(fs))).cloned()
    }

    /// Close every log file and forget all of them, whatever their owner
    /// counts.
    ///
    /// This is a hard reset for shutdown, logging reconfiguration and tests.
    /// Tokens still held by callers stay valid objects, but writing through
    /// them fails and closing them does nothing.
    pub fn close_log_files(&self) {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Closing all log files ({} open)", files.len());
        for shared in files.values() {
            shared.shut();
        }
        files.clear();
    }

    pub fn len(&self) -> usize {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop one owner of `shared`, closing and unregistering it at zero.
    pub(crate) fn release(&self, shared: &Arc<SharedLogFile>) {
        let mut files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(owners) = shared.release() else {
            // Already torn down by close_log_files
            return;
        };
        if owners > 0 {
            debug!("Log file released: {} (owners: {})", shared.path().display(), owners);
            return;
        }

        let key = (shared.path().to_path_buf(), fs_identity(shared.file_system()));
        if files
            .get(&key)
            .is_some_and(|registered| Arc::ptr_eq(registered, shared))
        {
            files.remove(&key);
        }
        shared.shut();
        debug!("Log file closed: {}", shared.path().display());
    }
}
