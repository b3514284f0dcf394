use crate::error::{PathMutexError, Result};
use crate::fs::FileSystem;
use crate::logfile::LogFileRegistry;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

/// An open log file shared by every owner of the same path.
pub struct SharedLogFile {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    state: Mutex<LogFileState>,
}

struct LogFileState {
    file: Option<File>,
    owners: usize,
}

impl SharedLogFile {
    pub(crate) fn new(path: PathBuf, fs: Arc<dyn FileSystem>, file: File) -> Self {
        SharedLogFile {
            path,
            fs,
            state: Mutex::new(LogFileState {
                file: Some(file),
                owners: 1,
            }),
        }
    }

    /// Canonical path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Number of outstanding owner tokens.
    pub fn owners(&self) -> usize {
        self.state().owners
    }

    pub fn is_open(&self) -> bool {
        self.state().file.is_some()
    }

    fn state(&self) -> MutexGuard<'_, LogFileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn acquire(&self) -> usize {
        let mut state = self.state();
        state.owners += 1;
        state.owners
    }

    /// Owners left after dropping one, or `None` if the file was already shut.
    pub(crate) fn release(&self) -> Option<usize> {
        let mut state = self.state();
        if state.owners == 0 {
            return None;
        }
        state.owners -= 1;
        Some(state.owners)
    }

    /// Close the file regardless of owners.
    pub(crate) fn shut(&self) {
        let mut state = self.state();
        state.owners = 0;
        state.file = None;
    }

    fn closed_error(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::Other,
            format!("log file {} has been closed", self.path.display()),
        )
    }
}

impl fmt::Debug for SharedLogFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("SharedLogFile")
            .field("path", &self.path)
            .field("owners", &state.owners)
            .field("open", &state.file.is_some())
            .finish()
    }
}

impl Write for &SharedLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.state().file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(self.closed_error()),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // One lock for the whole buffer keeps concurrent lines whole
        match self.state().file.as_mut() {
            Some(file) => file.write_all(buf),
            None => Err(self.closed_error()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.state().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// One owner's claim on a [`SharedLogFile`].
///
/// Closing (or dropping) the handle gives up the claim; the last claim closes
/// the file.
#[derive(Debug)]
pub struct LogFileHandle {
    shared: Arc<SharedLogFile>,
    registry: LogFileRegistry,
    closed: bool,
}

impl LogFileHandle {
    pub(crate) fn new(shared: Arc<SharedLogFile>, registry: LogFileRegistry) -> Self {
        LogFileHandle {
            shared,
            registry,
            closed: false,
        }
    }

    pub fn path(&self) -> &Path {
        self.shared.path()
    }

    /// The file this handle shares with the other owners.
    pub fn shared(&self) -> &Arc<SharedLogFile> {
        &self.shared
    }

    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(PathMutexError::ClosedTwice(self.shared.path().to_path_buf()));
        }
        self.closed = true;
        self.registry.release(&self.shared);
        Ok(())
    }
}

impl Drop for LogFileHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.registry.release(&self.shared);
        }
    }
}

impl Write for LogFileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.shared).write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        (&*self.shared).write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.shared).flush()
    }
}

impl<'a> MakeWriter<'a> for LogFileHandle {
    type Writer = &'a SharedLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        &self.shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFs;
    use tempfile::TempDir;

    #[test]
    fn test_release_counts_down_then_stops() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.log");
        let file = File::create(&path).unwrap();
        let shared = SharedLogFile::new(path, OsFs::shared(), file);

        assert_eq!(shared.acquire(), 2);
        assert_eq!(shared.release(), Some(1));
        assert_eq!(shared.release(), Some(0));
        assert_eq!(shared.release(), None);
    }

    #[test]
    fn test_write_after_shut_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.log");
        let file = File::create(&path).unwrap();
        let shared = SharedLogFile::new(path, OsFs::shared(), file);

        (&shared).write_all(b"before\n").unwrap();
        shared.shut();

        assert!(!shared.is_open());
        assert!((&shared).write_all(b"after\n").is_err());
        assert!((&shared).flush().is_ok());
    }
}
