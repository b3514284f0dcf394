use crate::cli::LockArgs;
use pathmutex::{MutexRegistry, PathMutexError, Result};
use std::path::Path;
use std::process::{Command, ExitStatus};
use tracing::{debug, info};

pub fn execute_exec(lock: &LockArgs, path: &Path, command: &[String]) -> Result<i32> {
    let Some((program, rest)) = command.split_first() else {
        return Err(PathMutexError::CommandFailed {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no command given"),
        });
    };

    let mutex = MutexRegistry::global().mutex_for(path)?;
    let guard = mutex.lock_with(lock.strategy()?)?;
    info!("Lock acquired: {}", guard.path().display());

    debug!("Running {} {:?}", program, rest);
    let status = Command::new(program)
        .args(rest)
        .status()
        .map_err(|e| PathMutexError::CommandFailed {
            program: program.clone(),
            source: e,
        });

    // Release before reporting, whatever the command did
    guard.close()?;
    let status = status?;

    info!("Command finished: {} ({})", program, status);
    Ok(exit_code(status))
}

/// The command's own exit code, or `128 + signal` when a signal killed it.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    128
}
