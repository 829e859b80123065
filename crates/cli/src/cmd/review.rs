//! Review command implementation
//!
//! Compare a proposed ledger against its base version and refuse changes to
//! entries that were already executed.

use actledger_engine::{parse, review};
use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::command::Command;
use crate::common::{RuntimeContext, render_parse_error};
use crate::error::{CommandError, Result};

/// Check a proposed ledger for changes to executed entries
#[derive(Debug, Args)]
pub struct ReviewCommand {
    /// Base version of the ledger (omit for a newly added file)
    #[arg(long, value_name = "FILE")]
    pub base: Option<PathBuf>,

    /// Proposed version of the ledger
    #[arg(value_name = "FILE")]
    pub head: PathBuf,

    /// Print violations as JSON
    #[arg(long)]
    pub json: bool,
}

fn read(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?)
}

impl Command for ReviewCommand {
    type Output = ();

    fn execute(&self, _context: &RuntimeContext) -> Result<()> {
        let base = match &self.base {
            Some(path) => read(path)?,
            None => String::new(),
        };
        let head = read(&self.head)?;

        let violations = match review(&base, &head) {
            Ok(violations) => violations,
            Err(error) => {
                let source = match &self.base {
                    Some(base_path) if parse(&base).is_err() => base_path,
                    _ => &self.head,
                };
                let error = error.with_file(source.display().to_string());
                eprint!("{}", render_parse_error(&error));
                return Err(error.into());
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&violations)?);
        } else if violations.is_empty() {
            println!(
                "{} {}",
                "✓".green(),
                "No executed entries were modified".bold()
            );
        } else {
            println!("{}", "Executed entries were modified:".red().bold());
            for violation in &violations {
                println!(
                    "  {} {} {}: {}",
                    "✗".red(),
                    violation.action_id.bold(),
                    format!("[{}]", violation.kind).yellow(),
                    violation.message
                );
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(CommandError::ReviewFailed(violations.len()))
        }
    }
}
