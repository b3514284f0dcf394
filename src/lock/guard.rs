use crate::error::{PathMutexError, Result};
use crate::lock::mutex::HybridMutex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Proof of holding a [`HybridMutex`].
///
/// [`close`](LockGuard::close) releases the lock exactly once; any later call
/// fails with [`PathMutexError::ClosedTwice`]. A guard dropped without being
/// closed releases the lock itself. Guards may be closed from a thread other
/// than the one that locked.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    mutex: Mutex<Option<Arc<HybridMutex>>>,
}

impl LockGuard {
    pub(crate) fn new(mutex: Arc<HybridMutex>) -> Self {
        LockGuard {
            path: mutex.path().to_path_buf(),
            mutex: Mutex::new(Some(mutex)),
        }
    }

    /// Canonical identity of the locked path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.mutex
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Release the file lock and then the in-process lock.
    ///
    /// The in-process lock is released even if unlocking the file fails; that
    /// failure is still returned.
    pub fn close(&self) -> Result<()> {
        let mut slot = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(mutex) = slot.take() else {
            return Err(PathMutexError::ClosedTwice(self.path.clone()));
        };
        mutex.unlock()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let slot = self
            .mutex
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mutex) = slot {
            if let Err(e) = mutex.unlock() {
                // Never panic in drop; the in-process lock is free either way
                warn!("Failed to release lock {} (non-fatal): {}", self.path.display(), e);
            }
        }
    }
}
