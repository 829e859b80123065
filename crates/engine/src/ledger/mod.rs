//! Ledger files
//!
//! A ledger is a date-named markdown file holding ordered action entries:
//!
//! ````text
//! # Actions for 2026-01-15
//!
//! - [ ] `a1` — *jira-comment* v1.0
//! ```yaml
//! inputs:
//!   ticket: PROJ-123
//! ```
//! ````
//!
//! ## Module Organization
//!
//! - `entry`: the action entry model
//! - `parser`: line scanner turning text into entries
//! - `editor`: in-place rewrite of a single entry
//! - `review`: immutability check between two versions of a ledger

pub mod editor;
pub mod entry;
pub mod parser;
pub mod review;

pub use editor::{EntryUpdate, UpdateOrigin, update_entry};
pub use entry::{ActionEntry, Mapping};
pub use parser::parse;
pub use review::{ReviewViolation, ViolationKind, review};

/// Split text into lines, each keeping its line ending
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Strip a trailing `\n` or `\r\n`
pub(crate) fn trim_eol(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Line ending used by `line` (`\n` when it has none)
pub(crate) fn line_ending(line: &str) -> &'static str {
    if line.ends_with("\r\n") { "\r\n" } else { "\n" }
}
