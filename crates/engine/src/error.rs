//! Error types for actledger-engine
//!
//! Each component reports its own typed failure. Structural ledger problems
//! carry a position and surrounding lines so callers can point at the source.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Lines of context kept on each side of the offending line
pub const CONTEXT_LINES: usize = 2;

/// A structural ledger error with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// File the text came from, when known
    pub file: Option<String>,
    /// 1-based line number of the offending line
    pub line: usize,
    /// What is wrong
    pub message: String,
    /// Surrounding lines as (1-based line number, text)
    pub context: Vec<(usize, String)>,
}

impl ParseError {
    /// Build an error at `index` (0-based) within `lines`, capturing context
    pub(crate) fn at(lines: &[&str], index: usize, message: impl Into<String>) -> Self {
        let index = index.min(lines.len().saturating_sub(1));
        let start = index.saturating_sub(CONTEXT_LINES);
        let end = (index + CONTEXT_LINES + 1).min(lines.len());
        let context = (start..end)
            .map(|i| (i + 1, crate::ledger::trim_eol(lines[i]).to_string()))
            .collect();

        Self {
            file: None,
            line: index + 1,
            message: message.into(),
            context,
        }
    }

    /// Attach the name of the file being parsed
    #[must_use]
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}: {}", self.line, self.message),
            None => write!(f, "line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Failure of an in-place ledger edit
#[derive(Error, Debug)]
pub enum EditError {
    /// No entry with this id exists in the ledger
    #[error("Action '{0}' not found in ledger")]
    NotFound(String),

    /// The entry is completed and the update would alter it
    #[error("Action '{id}' is completed and immutable: {reason}")]
    ImmutableEntry {
        /// Entry id
        id: String,
        /// Which rule the update broke
        reason: String,
    },

    /// The update is not allowed on a pending entry
    #[error("Invalid update for action '{id}': {reason}")]
    InvalidUpdate {
        /// Entry id
        id: String,
        /// Which rule the update broke
        reason: String,
    },

    /// The ledger text could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The merged block could not be serialized
    #[error("Failed to serialize block for action '{id}': {message}")]
    Serialize {
        /// Entry id
        id: String,
        /// Serializer message
        message: String,
    },
}

/// Input-contract violation of a script run
///
/// Failures of the invoked program itself are never errors; they are
/// reported in the run outcome.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Timeouts must be positive
    #[error("Invalid timeout {0}s: must be greater than zero")]
    InvalidTimeout(u64),

    /// The request payload could not be serialized
    #[error("Failed to serialize request: {0}")]
    Request(#[from] serde_json::Error),
}

/// Failure of the outer execution loop for one ledger file
#[derive(Error, Debug)]
pub enum ExecuteError {
    /// Reading the ledger failed
    #[error("Failed to read ledger {}: {source}", path.display())]
    Read {
        /// Ledger path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing the ledger failed
    #[error("Failed to write ledger {}: {source}", path.display())]
    Write {
        /// Ledger path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The ledger is structurally broken
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Recording an outcome in the ledger failed
    #[error(transparent)]
    Edit(#[from] EditError),

    /// The action request could not be built
    #[error(transparent)]
    Runner(#[from] RunnerError),
}
