use clap::Parser;
use pathmutex::{LogFileRegistry, MutexRegistry, Result};
use std::process;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

mod cli;

fn main() {
    let args = cli::Args::parse();

    if let Err(e) = init_tracing(&args) {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }

    match cli::run(args) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

/// Diagnostics go to stderr, or to a shared log file with `--log-file`.
fn init_tracing(args: &cli::Args) -> Result<()> {
    let level = if args.quiet {
        Level::ERROR
    } else {
        match args.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let (writer, ansi) = match &args.log_file {
        Some(path) => {
            // Same filesystem as `append`, so both share one handle
            let fs = MutexRegistry::global().file_system();
            let log = LogFileRegistry::global().log_file_for(path, fs)?;
            (BoxMakeWriter::new(log), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_ansi(ansi)
        .init();
    Ok(())
}
