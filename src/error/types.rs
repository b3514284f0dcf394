use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathMutexError {
    #[error("Failed to resolve lock identity for {path}: {source}")]
    Resolve { path: PathBuf, source: io::Error },

    #[error("Path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to create lock file {path}: {source}")]
    LockCreationFailed { path: PathBuf, source: io::Error },

    #[error("Failed to acquire lock on {path}: {source}")]
    LockAcquisitionFailed { path: PathBuf, source: io::Error },

    #[error("Failed to release lock on {path}: {source}")]
    LockReleaseFailed { path: PathBuf, source: io::Error },

    #[error("Failed to acquire lock on {0}: file is locked by another process")]
    LockWouldBlock(PathBuf),

    #[error("Failed to acquire lock on {path}: timeout after {duration:?}")]
    LockTimeout { path: PathBuf, duration: Duration },

    #[error("Handle for {0} closed twice")]
    ClosedTwice(PathBuf),

    #[error("Failed to open log file {path}: {source}")]
    LogFileOpenFailed { path: PathBuf, source: io::Error },

    #[error("Invalid duration format '{input}': {message}")]
    InvalidDuration { input: String, message: String },

    #[error("Failed to run {program}: {source}")]
    CommandFailed { program: String, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PathMutexError {
    pub fn exit_code(&self) -> i32 {
        match self {
            PathMutexError::LockTimeout { .. } | PathMutexError::LockWouldBlock(_) => 2,
            PathMutexError::Io(e) if e.kind() == io::ErrorKind::Interrupted => 3,
            PathMutexError::CommandFailed { source, .. }
                if source.kind() == io::ErrorKind::Interrupted =>
            {
                3
            }
            _ => 1,
        }
    }

    /// True for the errors that mean "someone else holds the lock".
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            PathMutexError::LockTimeout { .. } | PathMutexError::LockWouldBlock(_)
        )
    }

    pub fn lock_would_block(path: impl Into<PathBuf>) -> Self {
        PathMutexError::LockWouldBlock(path.into())
    }
}

pub type Result<T> = std::result::Result<T, PathMutexError>;
