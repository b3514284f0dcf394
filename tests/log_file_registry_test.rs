use pathmutex::{FileSystem, LogFileRegistry, OsFs, PathMutexError};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

/// Host filesystem under a different identity.
#[derive(Debug)]
struct OtherFs;

impl FileSystem for OtherFs {
    fn exists(&self, path: &Path) -> bool {
        OsFs.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        OsFs.is_dir(path)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        OsFs.canonicalize(path)
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<File> {
        OsFs.open(path, options)
    }
}

#[test]
fn test_two_handles_share_one_file() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();
    let path = temp.path().join("a.log");

    let mut h1 = registry.log_file_for(&path, &vfs).unwrap();
    let mut h2 = registry.log_file_for(&path, &vfs).unwrap();

    assert!(Arc::ptr_eq(h1.shared(), h2.shared()));
    assert_eq!(h1.shared().owners(), 2);
    assert_eq!(registry.len(), 1);

    h1.close().unwrap();
    assert!(h2.shared().is_open());
    assert_eq!(h2.shared().owners(), 1);
    h2.write_all(b"still open\n").unwrap();
    assert!(registry.get_log_file_for(&path, &vfs).is_some());

    let shared = Arc::clone(h2.shared());
    h2.close().unwrap();
    assert!(!shared.is_open());
    assert!(registry.get_log_file_for(&path, &vfs).is_none());
    assert!(registry.is_empty());

    assert_eq!(fs::read_to_string(&path).unwrap(), "still open\n");
}

#[test]
fn test_equivalent_spellings_share() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();
    fs::create_dir(temp.path().join("logs")).unwrap();

    let h1 = registry
        .log_file_for(&temp.path().join("logs").join("a.log"), &vfs)
        .unwrap();
    let h2 = registry
        .log_file_for(&temp.path().join("logs").join(".").join("a.log"), &vfs)
        .unwrap();

    assert!(Arc::ptr_eq(h1.shared(), h2.shared()));
}

#[test]
fn test_get_does_not_change_owners() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();
    let path = temp.path().join("a.log");

    assert!(registry.get_log_file_for(&path, &vfs).is_none());

    let handle = registry.log_file_for(&path, &vfs).unwrap();
    let found = registry.get_log_file_for(&path, &vfs).unwrap();

    assert!(Arc::ptr_eq(handle.shared(), &found));
    assert_eq!(found.owners(), 1);
}

#[test]
fn test_second_close_fails() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();

    let mut handle = registry.log_file_for(&temp.path().join("a.log"), &vfs).unwrap();
    handle.close().unwrap();

    assert!(matches!(
        handle.close(),
        Err(PathMutexError::ClosedTwice(_))
    ));
}

#[test]
fn test_drop_releases_owner() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();
    let path = temp.path().join("a.log");

    let keep = registry.log_file_for(&path, &vfs).unwrap();
    {
        let _extra = registry.log_file_for(&path, &vfs).unwrap();
        assert_eq!(keep.shared().owners(), 2);
    }
    assert_eq!(keep.shared().owners(), 1);

    drop(keep);
    assert!(registry.is_empty());
}

#[test]
fn test_close_log_files_is_a_hard_reset() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();
    let a = temp.path().join("a.log");
    let b = temp.path().join("b.log");

    let mut h1 = registry.log_file_for(&a, &vfs).unwrap();
    let _h2 = registry.log_file_for(&a, &vfs).unwrap();
    let _h3 = registry.log_file_for(&b, &vfs).unwrap();
    assert_eq!(registry.len(), 2);

    registry.close_log_files();

    assert!(registry.is_empty());
    assert!(registry.get_log_file_for(&a, &vfs).is_none());
    assert!(registry.get_log_file_for(&b, &vfs).is_none());
    assert!(!h1.shared().is_open());
    assert!(h1.write_all(b"too late\n").is_err());

    // Closing a torn-down handle is harmless
    h1.close().unwrap();

    // A fresh handle opens a new file
    let fresh = registry.log_file_for(&a, &vfs).unwrap();
    assert!(!Arc::ptr_eq(fresh.shared(), h1.shared()));
    assert_eq!(fresh.shared().owners(), 1);
}

#[test]
fn test_stale_handle_does_not_close_new_file() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();
    let path = temp.path().join("a.log");

    let stale = registry.log_file_for(&path, &vfs).unwrap();
    registry.close_log_files();
    let mut fresh = registry.log_file_for(&path, &vfs).unwrap();

    drop(stale);

    assert!(fresh.shared().is_open());
    assert!(registry.get_log_file_for(&path, &vfs).is_some());
    fresh.write_all(b"ok\n").unwrap();
}

#[test]
fn test_appends_interleave_without_truncation() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();
    let path = temp.path().join("a.log");
    fs::write(&path, "existing\n").unwrap();

    let mut h1 = registry.log_file_for(&path, &vfs).unwrap();
    let mut h2 = registry.log_file_for(&path, &vfs).unwrap();

    h1.write_all(b"one\n").unwrap();
    h2.write_all(b"two\n").unwrap();
    h1.write_all(b"three\n").unwrap();
    h1.close().unwrap();
    h2.close().unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "existing\none\ntwo\nthree\n"
    );
}

#[test]
fn test_concurrent_writers_keep_lines_whole() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();
    let path = temp.path().join("a.log");

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let registry = registry.clone();
            let vfs = Arc::clone(&vfs);
            let path = path.clone();
            thread::spawn(move || {
                let mut handle = registry.log_file_for(&path, &vfs).unwrap();
                for n in 0..50 {
                    handle
                        .write_all(format!("writer {} line {}\n", i, n).as_bytes())
                        .unwrap();
                }
                handle.close().unwrap();
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 200);
    assert!(content.lines().all(|l| l.starts_with("writer ")));
    assert!(registry.is_empty());
}

#[test]
fn test_filesystems_are_kept_apart() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let os: Arc<dyn FileSystem> = OsFs::shared();
    let other: Arc<dyn FileSystem> = Arc::new(OtherFs);
    let path = temp.path().join("a.log");

    let h1 = registry.log_file_for(&path, &os).unwrap();
    let h2 = registry.log_file_for(&path, &other).unwrap();

    assert!(!Arc::ptr_eq(h1.shared(), h2.shared()));
    assert_eq!(registry.len(), 2);
    assert_eq!(h1.shared().owners(), 1);
}

#[test]
fn test_open_failure_leaves_registry_untouched() {
    let temp = TempDir::new().unwrap();
    let registry = LogFileRegistry::new();
    let vfs = OsFs::shared();

    // A directory cannot be opened for appending
    let result = registry.log_file_for(temp.path(), &vfs);
    assert!(matches!(
        result,
        Err(PathMutexError::LogFileOpenFailed { .. })
    ));

    let result = registry.log_file_for(&temp.path().join("missing").join("a.log"), &vfs);
    assert!(matches!(result, Err(PathMutexError::Resolve { .. })));

    assert!(registry.is_empty());
}
