use crate::cli::LockArgs;
use chrono::Local;
use pathmutex::{LogFileRegistry, MutexRegistry, PathMutexError, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub fn execute_append(
    lock: &LockArgs,
    path: &Path,
    input: Option<&Path>,
    timestamp: bool,
) -> Result<i32> {
    let registry = MutexRegistry::global();
    let guard = registry
        .mutex_for(&append_lock_path(path)?)?
        .lock_with(lock.strategy()?)?;
    info!("Lock acquired: {}", guard.path().display());

    let mut log = LogFileRegistry::global().log_file_for(path, registry.file_system())?;
    debug!(
        "Appending to {} (owners: {})",
        log.path().display(),
        log.shared().owners()
    );

    let input: Box<dyn Read> = match input {
        Some(input_file) => Box::new(File::open(input_file).map_err(|e| {
            PathMutexError::Io(io::Error::new(
                e.kind(),
                format!("Failed to open input file {}: {}", input_file.display(), e),
            ))
        })?),
        None => Box::new(io::stdin()),
    };

    let written = copy_lines(BufReader::new(input), &mut log, timestamp)?;
    log.flush()?;
    log.close()?;
    guard.close()?;

    info!("Appended {} bytes to {}", written, path.display());
    Ok(0)
}

/// Appends coordinate on `<log>.lock` beside the log rather than on the log
/// itself. Windows refuses writes to a locked range through any other handle,
/// including the shared log handle of this very process.
fn append_lock_path(path: &Path) -> Result<PathBuf> {
    let mut name = path
        .file_name()
        .ok_or_else(|| PathMutexError::NoFileName(path.to_path_buf()))?
        .to_os_string();
    name.push(".lock");
    Ok(path.with_file_name(name))
}

fn copy_lines(mut input: impl BufRead, out: &mut impl Write, timestamp: bool) -> Result<u64> {
    let mut line = Vec::new();
    let mut written = 0u64;
    loop {
        line.clear();
        let n = input.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }
        let record = if timestamp {
            let mut stamped = format!("{} ", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
                .into_bytes();
            stamped.extend_from_slice(&line);
            stamped
        } else {
            std::mem::take(&mut line)
        };
        // One write per line keeps lines from different writers apart
        out.write_all(&record)?;
        written += record.len() as u64;
    }
    Ok(written)
}
