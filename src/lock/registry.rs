use crate::error::Result;
use crate::fs::{FileSystem, OsFs};
use crate::lock::identity::lock_identity;
use crate::lock::mutex::HybridMutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::debug;

/// One [`HybridMutex`] per lock identity.
///
/// Every lookup of paths that resolve to the same identity returns the same
/// mutex, which is what lets threads racing on a path nobody has locked yet
/// serialize against each other. Entries live as long as the registry.
#[derive(Debug)]
pub struct MutexRegistry {
    fs: Arc<dyn FileSystem>,
    mutexes: Mutex<HashMap<PathBuf, Arc<HybridMutex>>>,
}

impl MutexRegistry {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        MutexRegistry {
            fs,
            mutexes: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry over the host filesystem.
    ///
    /// Created on first use and never torn down.
    pub fn global() -> &'static MutexRegistry {
        static GLOBAL: OnceLock<MutexRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| MutexRegistry::new(OsFs::shared()))
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// The mutex for `path`, created on first lookup.
    pub fn mutex_for(&self, path: &Path) -> Result<Arc<HybridMutex>> {
        // Resolve before taking the registry lock, resolution does I/O
        let identity = lock_identity(self.fs.as_ref(), path)?;

        let mut mutexes = self.mutexes.lock().unwrap_or_else(PoisonError::into_inner);
        let mutex = mutexes.entry(identity).or_insert_with_key(|identity| {
            debug!("Registering mutex: {}", identity.display());
            Arc::new(HybridMutex::new(identity.clone(), Arc::clone(&self.fs)))
        });
        Ok(Arc::clone(mutex))
    }

    pub fn len(&self) -> usize {
        self.mutexes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every registered mutex. Meant for test isolation.
    ///
    /// Mutexes handed out earlier keep working, but later lookups of the same
    /// path get a fresh mutex that does not exclude holders of the old one
    /// within this process.
    pub fn reset(&self) {
        let mut mutexes = self.mutexes.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Resetting mutex registry ({} entries)", mutexes.len());
        mutexes.clear();
    }
}

impl Default for MutexRegistry {
    fn default() -> Self {
        MutexRegistry::new(OsFs::shared())
    }
}
