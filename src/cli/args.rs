use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pathmutex",
    version,
    about = "Serialize commands and log appends across processes with path-keyed locks",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Verbose output
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short = 'q', long, conflicts_with = "verbose", global = true)]
    pub quiet: bool,

    /// Write diagnostics to this log file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct LockArgs {
    /// Fail immediately if locked
    #[arg(long, conflicts_with = "timeout")]
    pub no_wait: bool,

    /// Give up waiting after this long (e.g. "500ms", "30s", "5m")
    #[arg(short = 't', long, value_name = "DURATION")]
    pub timeout: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command while holding the lock for PATH
    Exec {
        #[command(flatten)]
        lock: LockArgs,

        /// File or directory to lock
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Command and arguments to run
        #[arg(value_name = "COMMAND", last = true, required = true)]
        command: Vec<String>,
    },

    /// Append input to a log file while holding its lock
    Append {
        #[command(flatten)]
        lock: LockArgs,

        /// Log file to append to (created if missing)
        #[arg(value_name = "LOGFILE")]
        path: PathBuf,

        /// Read from file instead of stdin
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Prefix every line with the local time
        #[arg(long)]
        timestamp: bool,
    },

    /// Print the lock identity PATH resolves to
    Identity {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}
