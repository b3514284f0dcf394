//! Path-keyed locks shared by threads and processes, and reference-counted
//! append-only log files

pub mod error;
pub mod fs;
pub mod lock;
pub mod logfile;
pub mod utils;

pub use error::{Error, PathMutexError, Result};
pub use fs::{FileSystem, OsFs};
pub use lock::{
    lock, lock_dir, mutex_for, try_lock, HybridMutex, LockGuard, LockStrategy, MutexRegistry,
    TimeoutConfig,
};
pub use logfile::{LogFileHandle, LogFileRegistry, SharedLogFile};
