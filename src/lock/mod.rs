mod guard;
mod identity;
mod mutex;
mod registry;

pub use guard::LockGuard;
pub use identity::{canonical_path, lock_identity, DIRECTORY_LOCK};
pub use mutex::{HybridMutex, LockStrategy, TimeoutConfig};
pub use registry::MutexRegistry;

use crate::error::{PathMutexError, Result};
use std::path::Path;
use std::sync::Arc;

/// The process-wide mutex for `path`.
pub fn mutex_for(path: &Path) -> Result<Arc<HybridMutex>> {
    MutexRegistry::global().mutex_for(path)
}

/// Block until the process-wide lock for `path` is held.
pub fn lock(path: &Path) -> Result<LockGuard> {
    mutex_for(path)?.lock()
}

/// Take the process-wide lock for `path` if it is free.
pub fn try_lock(path: &Path) -> Result<Option<LockGuard>> {
    mutex_for(path)?.try_lock()
}

/// Lock an existing directory through its [`DIRECTORY_LOCK`] file.
pub fn lock_dir(dir: &Path) -> Result<LockGuard> {
    let registry = MutexRegistry::global();
    if !registry.file_system().is_dir(dir) {
        return Err(PathMutexError::NotADirectory(dir.to_path_buf()));
    }
    registry.mutex_for(dir)?.lock()
}
