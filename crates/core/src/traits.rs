//! Collaborator traits for actledger components
//!
//! The execution loop persists every action outcome before moving on to the
//! next entry. Publishing that file (a git commit in CI) is an external
//! concern, abstracted here so the loop can be driven without a repository.

use crate::Result;
use std::path::Path;

/// Records a rewritten ledger file durably outside the process
///
/// # Examples
///
/// ```ignore
/// fn publish(committer: &dyn Committer, ledger: &Path, id: &str) -> Result<()> {
///     let message = format!("Execute action {id} [skip ci]");
///     committer.commit(ledger, &message)?;
///     Ok(())
/// }
/// ```
pub trait Committer {
    /// Commit the current content of `path`
    ///
    /// Returns `Ok(false)` when there was nothing to commit.
    fn commit(&self, path: &Path, message: &str) -> Result<bool>;
}

/// Committer that never commits (local runs, tests, `--no-commit`)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommit;

impl Committer for NoCommit {
    fn commit(&self, _path: &Path, _message: &str) -> Result<bool> {
        Ok(false)
    }
}
