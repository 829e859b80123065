//! Logging configuration for the actledger CLI
//!
//! Compact terminal output on stderr plus an optional debug-level file log
//! using tracing. Standard output is left to command results.

use crate::Result;
use actledger_core::Error;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system
///
/// `RUST_LOG` overrides the default `actledger=<level>` filter.
///
/// # Examples
/// ```ignore
/// // Info level on stderr
/// init(false, None)?;
///
/// // Debug level with a file log
/// init(true, Some(Path::new("actledger.log")))?;
/// ```
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "actledger={level},actledger_engine={level},actledger_config={level}"
        ))
        .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))?,
    };

    let terminal_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(std::io::stderr().is_terminal());

    // Timestamps only in verbose mode
    let terminal_layer = if verbose {
        terminal_layer.with_filter(env_filter).boxed()
    } else {
        terminal_layer.without_time().with_filter(env_filter).boxed()
    };

    let file_layer = match log_file {
        Some(log_path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .map_err(|e| Error::FileWrite {
                    path: log_path.to_path_buf(),
                    source: e,
                })?;

            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .pretty()
                    .with_filter(EnvFilter::new("debug"))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {e}")))?;

    Ok(())
}
