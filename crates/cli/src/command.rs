//! Command trait for the actledger CLI

use crate::common::RuntimeContext;
use crate::error::Result;

/// A subcommand that runs against a loaded project
///
/// `Output` lets callers and tests inspect what a command produced; `execute`
/// returns the [`ExecutionReport`](actledger_engine::ExecutionReport) while
/// the listing commands return `()`.
///
/// ```rust,ignore
/// #[derive(Debug, clap::Args)]
/// pub struct LedgerDir;
///
/// impl Command for LedgerDir {
///     type Output = std::path::PathBuf;
///
///     fn execute(&self, context: &RuntimeContext) -> Result<Self::Output> {
///         Ok(context.config.ledger_dir())
///     }
/// }
/// ```
pub trait Command {
    /// Value produced by a successful run
    type Output;

    /// Run the command
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` describing the failure; outcomes that only
    /// affect the exit status (failed actions, review findings) are errors too
    fn execute(&self, context: &RuntimeContext) -> Result<Self::Output>;
}
