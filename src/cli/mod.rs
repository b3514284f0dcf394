mod append_command;
mod args;
mod exec_command;

use pathmutex::lock::lock_identity;
use pathmutex::utils::parse_duration;
use pathmutex::{LockStrategy, MutexRegistry, Result, TimeoutConfig};
pub use args::{Args, Command, LockArgs};

/// Run the parsed command, returning the process exit code.
pub fn run(args: Args) -> Result<i32> {
    match args.command {
        Command::Exec {
            lock,
            path,
            command,
        } => exec_command::execute_exec(&lock, &path, &command),
        Command::Append {
            lock,
            path,
            input,
            timestamp,
        } => append_command::execute_append(&lock, &path, input.as_deref(), timestamp),
        Command::Identity { path } => {
            let registry = MutexRegistry::global();
            let identity = lock_identity(registry.file_system().as_ref(), &path)?;
            println!("{}", identity.display());
            Ok(0)
        }
    }
}

impl LockArgs {
    pub fn strategy(&self) -> Result<LockStrategy> {
        if self.no_wait {
            return Ok(LockStrategy::NoWait);
        }
        match &self.timeout {
            Some(timeout) => Ok(LockStrategy::Timeout(TimeoutConfig::new(parse_duration(
                timeout,
            )?))),
            None => Ok(LockStrategy::Wait),
        }
    }
}
