use crate::error::{PathMutexError, Result};
use crate::fs::FileSystem;
use crate::lock::guard::LockGuard;
use fs2::FileExt;
use rand::Rng;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub duration: Duration,
    pub max_poll_interval: Duration,
}

impl TimeoutConfig {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            max_poll_interval: Duration::from_millis(1000),
        }
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_poll_interval = max_interval;
        self
    }

    /// Pause before the next poll: starts at 10ms, grows by half per attempt
    /// up to `max_poll_interval`, plus up to 100ms of jitter.
    fn poll_delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        // 1.5^32 is already far past any sensible cap
        let growth = 1.5f64.powi(attempt.min(32) as i32);
        let base = Duration::from_millis(10).mul_f64(growth);
        base.min(self.max_poll_interval) + Duration::from_millis(rng.gen_range(0..100))
    }
}

#[derive(Debug, Clone)]
pub enum LockStrategy {
    Wait,
    NoWait,
    Timeout(TimeoutConfig),
}

/// Exclusion between threads of this process.
///
/// Unlike a `MutexGuard`, holding it is not tied to a thread, so a lock taken
/// on one thread can be released on another.
#[derive(Debug, Default)]
struct ProcessLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl ProcessLock {
    fn acquire(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        while *held {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *held = true;
    }

    fn try_acquire(&self) -> bool {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if *held {
            return false;
        }
        *held = true;
        true
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        *held = false;
        drop(held);
        self.released.notify_one();
    }

    fn is_held(&self) -> bool {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mutual exclusion on a path, between threads and between processes.
///
/// Acquisition takes the in-process lock first and the advisory file lock
/// second; release goes in the opposite order. Advisory locks may be shared by
/// every thread of a process, so the in-process lock is what keeps two
/// threads of the same process apart.
///
/// Obtain instances from a [`MutexRegistry`](crate::lock::MutexRegistry) so
/// that every caller locking the same path shares one mutex.
pub struct HybridMutex {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    process: ProcessLock,
    file: OnceLock<File>,
}

impl HybridMutex {
    pub(crate) fn new(path: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        HybridMutex {
            path,
            fs,
            process: ProcessLock::default(),
            file: OnceLock::new(),
        }
    }

    /// Canonical identity of the locked path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether some thread of this process currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.process.is_held()
    }

    /// Block until both the in-process and the file lock are held.
    pub fn lock(self: &Arc<Self>) -> Result<LockGuard> {
        debug!("Acquiring lock: {}", self.path.display());

        self.process.acquire();
        let locked = self.lock_file().and_then(|file| {
            file.lock_exclusive()
                .map_err(|e| PathMutexError::LockAcquisitionFailed {
                    path: self.path.clone(),
                    source: e,
                })
        });
        if let Err(e) = locked {
            self.process.release();
            return Err(e);
        }

        debug!("Lock acquired: {}", self.path.display());
        Ok(LockGuard::new(Arc::clone(self)))
    }

    /// Take the lock if nobody holds it.
    ///
    /// Returns `Ok(None)` when the lock is held, either by another thread of
    /// this process or by another process. Only real failures are errors.
    pub fn try_lock(self: &Arc<Self>) -> Result<Option<LockGuard>> {
        if !self.process.try_acquire() {
            debug!("Lock held in process: {}", self.path.display());
            return Ok(None);
        }

        let file = match self.lock_file() {
            Ok(file) => file,
            Err(e) => {
                self.process.release();
                return Err(e);
            }
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Lock acquired: {}", self.path.display());
                Ok(Some(LockGuard::new(Arc::clone(self))))
            }
            // Windows reports a held lock as ERROR_SHARING_VIOLATION (32)
            // or ERROR_LOCK_VIOLATION (33) rather than WouldBlock
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || (cfg!(windows) && matches!(e.raw_os_error(), Some(32 | 33))) =>
            {
                self.process.release();
                debug!("Lock held by another process: {}", self.path.display());
                Ok(None)
            }
            Err(e) => {
                self.process.release();
                Err(PathMutexError::LockAcquisitionFailed {
                    path: self.path.clone(),
                    source: e,
                })
            }
        }
    }

    /// Acquire the lock the way `strategy` asks for.
    ///
    /// `NoWait` turns contention into [`PathMutexError::LockWouldBlock`];
    /// `Timeout` polls [`try_lock`](Self::try_lock) with backoff and gives up
    /// with [`PathMutexError::LockTimeout`].
    pub fn lock_with(self: &Arc<Self>, strategy: LockStrategy) -> Result<LockGuard> {
        debug!(
            "Acquiring lock: {} (strategy: {:?})",
            self.path.display(),
            strategy
        );

        match strategy {
            LockStrategy::Wait => self.lock(),
            LockStrategy::NoWait => self
                .try_lock()?
                .ok_or_else(|| PathMutexError::LockWouldBlock(self.path.clone())),
            LockStrategy::Timeout(config) => {
                let start = Instant::now();
                let mut rng = rand::thread_rng();

                for attempt in 0.. {
                    if let Some(guard) = self.try_lock()? {
                        return Ok(guard);
                    }

                    let elapsed = start.elapsed();
                    if elapsed >= config.duration {
                        break;
                    }
                    // Never sleep past the deadline
                    std::thread::sleep(
                        config
                            .poll_delay(attempt, &mut rng)
                            .min(config.duration - elapsed),
                    );
                }

                Err(PathMutexError::LockTimeout {
                    path: self.path.clone(),
                    duration: config.duration,
                })
            }
        }
    }

    /// Release the file lock, then the in-process lock.
    ///
    /// Only [`LockGuard`] calls this, and only while the lock is held.
    pub(crate) fn unlock(&self) -> Result<()> {
        let released = match self.file.get() {
            Some(file) => {
                FileExt::unlock(file).map_err(|e| PathMutexError::LockReleaseFailed {
                    path: self.path.clone(),
                    source: e,
                })
            }
            None => Ok(()),
        };
        self.process.release();

        debug!("Lock released: {}", self.path.display());
        released
    }

    /// The lock file, opened on first use.
    ///
    /// Callers hold the in-process lock, so the file is opened at most once.
    fn lock_file(&self) -> Result<&File> {
        if let Some(file) = self.file.get() {
            return Ok(file);
        }

        let mut opts = OpenOptions::new();
        opts.read(true).write(true).create(true).truncate(false);

        let file = self
            .fs
            .open(&self.path, &opts)
            .map_err(|e| PathMutexError::LockCreationFailed {
                path: self.path.clone(),
                source: e,
            })?;

        debug!("Lock file opened: {}", self.path.display());
        Ok(self.file.get_or_init(|| file))
    }
}

impl fmt::Debug for HybridMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridMutex")
            .field("path", &self.path)
            .field("locked", &self.is_locked())
            .finish()
    }
}
