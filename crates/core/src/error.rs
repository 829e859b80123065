//! Base error types for actledger
//!
//! This module provides the foundation error types that all crates can use.
//! Component-specific failures (ledger parsing, editing, script runs) have
//! their own typed errors in `actledger-engine`.

use std::path::PathBuf;
use thiserror::Error;

/// Base error type for shared functionality
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a file
    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        /// File that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("Failed to write {}: {source}", path.display())]
    FileWrite {
        /// File that could not be written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Action registry error
    #[error("Action registry error: {0}")]
    Registry(String),

    /// Hook configuration error
    #[error("Hook configuration error: {0}")]
    HookConfig(String),

    /// Async hook supervisor could not be started
    #[error("Hook supervisor error: {0}")]
    Supervisor(String),

    /// Committing a ledger file failed
    #[error("Commit failed for {}: {message}", path.display())]
    Commit {
        /// Ledger file being committed
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Generic error message
    #[error("{0}")]
    Message(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
