//! # actledger engine
//!
//! Core library of the actledger action ledger.
//!
//! - **Ledger**: parsing date-named markdown ledgers and editing one entry in
//!   place without disturbing the rest of the file
//! - **Review**: immutability check between two versions of a ledger
//! - **Runner**: bounded-time JSON request/response contract with scripts
//! - **Hooks**: lifecycle hooks with ordering, retries, detached execution
//!   and loop prevention
//! - **Audit**: JSON Lines record of every hook invocation
//! - **Executor**: the sequential loop running pending entries

pub mod audit;
pub mod error;
pub mod executor;
pub mod fs;
pub mod git;
pub mod hooks;
pub mod ledger;
pub mod runner;

// Re-export error types from core
pub use actledger_core::{Error, Result};

// Re-export commonly used types
pub use audit::AuditLog;
pub use error::{EditError, ExecuteError, ParseError, RunnerError};
pub use executor::{ActionResult, ExecutionReport, LedgerExecutor, ResultStatus};
pub use git::GitCommitter;
pub use hooks::{HookDispatcher, HookExecutionRecord, HookLoader, LifecycleEvent};
pub use ledger::{ActionEntry, EntryUpdate, ReviewViolation, parse, review, update_entry};
pub use runner::{OutcomeKind, ScriptOutcome, ScriptRunner};
