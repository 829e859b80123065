//! Error types for CLI commands
//!
//! Structured errors for command execution. Engine and configuration errors
//! are carried through; outcomes that only matter to the exit status (failed
//! actions, review violations) get their own variants.

use actledger_engine::{EditError, ExecuteError, ParseError};
use thiserror::Error;

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// Configuration, registry or hook loading failed
    #[error(transparent)]
    Core(#[from] actledger_core::Error),

    /// A ledger could not be executed
    #[error(transparent)]
    Execute(#[from] ExecuteError),

    /// A ledger is structurally broken
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An edit was refused
    #[error(transparent)]
    Edit(#[from] EditError),

    /// Some actions failed during execution
    #[error("{failed} of {executed} executed actions failed")]
    ActionsFailed {
        /// Number of failed actions
        failed: usize,
        /// Number of executed actions
        executed: usize,
    },

    /// Some ledger files could not be processed
    #[error("{count} ledger file(s) could not be processed")]
    InvalidLedgers {
        /// Number of failing files
        count: usize,
    },

    /// The proposal modifies executed entries
    #[error("Review found {0} violation(s)")]
    ReviewFailed(usize),

    /// A glob pattern is malformed
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern as given
        pattern: String,
        /// What is wrong with it
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON output could not be produced
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_actions_failed_message() {
        let error = CommandError::ActionsFailed {
            failed: 1,
            executed: 2,
        };
        assert_eq!(error.to_string(), "1 of 2 executed actions failed");
    }

    #[test]
    fn test_core_error_is_transparent() {
        let error: CommandError = actledger_core::Error::Config("bad".to_string()).into();
        assert_eq!(error.to_string(), "Invalid configuration: bad");
    }

    #[test]
    fn test_review_failed_message() {
        assert_eq!(
            CommandError::ReviewFailed(3).to_string(),
            "Review found 3 violation(s)"
        );
    }
}
